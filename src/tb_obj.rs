use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// TbObj allows tasks and the runner to share test objects (test records, device statistics).
// Tasks must be Send, so this wraps an Arc<Mutex<_>> even though the simulation is single
// threaded. Accesses are short and never held across an await.
pub struct TbObj<T>(Arc<Mutex<T>>);

impl<T> TbObj<T> {
    pub fn new(data: T) -> TbObj<T> {
        TbObj(Arc::new(Mutex::new(data)))
    }
    pub fn get(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.get())
    }
}

impl<T: Clone> TbObj<T> {
    pub fn snapshot(&self) -> T {
        self.get().clone()
    }
}

impl<T> Clone for TbObj<T> {
    fn clone(&self) -> Self {
        TbObj(self.0.clone())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for TbObj<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TbObj").field(&*self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_data() {
        let a = TbObj::new(1_u32);
        let b = a.clone();
        b.with_mut(|v| *v += 41);
        assert_eq!(a.snapshot(), 42);
    }
}
