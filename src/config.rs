/// Options for one run of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Run the semantic analyzer before executing.
    pub check: bool,
    /// Deepest chain of nested user-function calls before the run aborts.
    pub max_call_depth: usize,
}

pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

impl Default for Config {
    fn default() -> Self {
        Self {
            check: true,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl Config {
    pub fn without_check(mut self) -> Self {
        self.check = false;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}
