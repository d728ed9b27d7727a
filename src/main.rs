use stepbench::prelude::*;
use stepbench::sequence::test_project;

// Specify tests to be executed
stepbench::run_with_sim!(StepCounter::new(); test_project);
