//! Passthrough parser for tools with no structured extraction yet (`whois`,
//! `dig`, `curl`, `hydra`, `sqlmap`, `nikto`). Always reports `EmptyOutput`
//! rather than `ParseFailed` — the invocation succeeded and produced text a
//! human can read, it just isn't translated into entities.

use crate::parser::{self, Input, OutputParser};

pub struct GenericParser;

impl OutputParser for GenericParser {
    fn parse(&self, _input: Input<'_>) -> redcell_core::ParseOutput {
        parser::empty_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redcell_core::coordinator::ParseInput;
    use redcell_core::knowledge::ParseStatus;

    #[test]
    fn always_reports_empty_output() {
        let output = GenericParser.parse(ParseInput {
            target: "10.0.0.1",
            stdout: "anything at all",
            stderr: "",
        });
        assert!(matches!(output.status, ParseStatus::EmptyOutput));
        assert!(output.batch.entities.is_empty());
    }
}
