use futures::future::BoxFuture;
use std::time::Instant;

use crate::signal::SimObject;
use crate::tb_obj::TbObj;
use crate::TbResult;

pub type TestFn = fn(SimObject) -> BoxFuture<'static, TbResult>;

#[derive(Debug, Default, Clone)]
pub struct TbTests(Vec<TbObj<Test>>);

impl TbTests {
    pub fn new() -> Self {
        Self(Vec::new())
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> core::slice::Iter<'_, TbObj<Test>> {
        self.0.iter()
    }
    pub fn push(&mut self, test: Test) {
        self.0.push(TbObj::new(test));
    }
    pub fn add(mut self, name: &str, generator: TestFn) -> Self {
        self.push(Test::new(name.to_string(), generator));
        self
    }
    pub(crate) fn filtered(&self, testcase: Option<&str>) -> Self {
        match testcase {
            Some(name) => Self(self.0.iter().filter(|t| t.get().name == name).cloned().collect()),
            None => self.clone(),
        }
    }
}

pub struct Test {
    pub name: String,
    pub generator: TestFn,
    pub result: Option<TbResult>,
    pub time_secs: f64,
    pub sim_time_ns: f64,
    started: Option<(Instant, f64, u64)>,
}

impl Test {
    pub fn new(name: String, generator: TestFn) -> Self {
        Self {
            name,
            generator,
            result: None,
            time_secs: 0.0,
            sim_time_ns: 0.0,
            started: None,
        }
    }
    pub(crate) fn begin(&mut self, sim_time_ns: f64, sim_steps: u64) {
        self.started = Some((Instant::now(), sim_time_ns, sim_steps));
    }
    pub(crate) fn start_steps(&self) -> Option<u64> {
        self.started.map(|(_, _, steps)| steps)
    }
    pub(crate) fn finish(&mut self, result: TbResult, sim_time_ns: f64) {
        if let Some((wall, sim_ns, _)) = self.started {
            self.time_secs = wall.elapsed().as_secs_f64();
            self.sim_time_ns = sim_time_ns - sim_ns;
        }
        self.result = Some(result);
    }
    pub fn passed(&self) -> bool {
        matches!(self.result, Some(Ok(_)))
    }
}

impl std::fmt::Debug for Test {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Test")
            .field("name", &self.name)
            .field("result", &self.result)
            .field("time_secs", &self.time_secs)
            .field("sim_time_ns", &self.sim_time_ns)
            .finish()
    }
}
