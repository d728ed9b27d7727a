use crate::TbResult;

#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Int(i64),
    Float(f64),
    BitStr(String),
    String(String),
    Error(String),
    None,
}

impl Val {
    /// Turns a trigger outcome into a test result, so `Trigger::...await.into_result()?`
    /// aborts the awaiting coroutine on failure.
    pub fn into_result(self) -> TbResult {
        match self {
            Val::Error(e) => Err(Val::Error(e)),
            other => Ok(other),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Val::Error(_))
    }
}
