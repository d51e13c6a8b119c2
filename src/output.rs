use crate::value::Value;

/// Receives every value printed by `imprimir`, in execution order.
pub trait OutputSink {
    fn print(&mut self, value: &Value);
}

/// Writes each printed value on its own line to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn print(&mut self, value: &Value) {
        println!("{}", value);
    }
}

/// Captures the text form of each printed value.
impl OutputSink for Vec<String> {
    fn print(&mut self, value: &Value) {
        self.push(value.to_string());
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn print(&mut self, value: &Value) {
        (**self).print(value);
    }
}
