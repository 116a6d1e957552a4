use std::str::FromStr;

use thiserror::Error;

use crate::inst::{Inst, InstError};

#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub insts: Vec<Inst>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error parsing trace line {line}: {source}")]
pub struct TraceError {
    pub line: usize,
    #[source]
    pub source: InstError,
}

impl FromStr for Trace {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut insts = Vec::default();

        for (i, line) in s.lines().enumerate() {
            // Strip comments and empty lines
            let line = line.trim();
            let line = line[..line.find('#').unwrap_or(line.len())].trim();
            if line.is_empty() {
                continue;
            }

            // Line numbers start at 1
            match Inst::from_str(line) {
                Ok(inst) => insts.push(inst),
                Err(source) => return Err(TraceError { line: i + 1, source }),
            }
        }

        Ok(Trace { insts })
    }
}

impl Trace {
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_blank_and_comments() {
        let trace = "# dot product\n\nflw f0,0(x1):0x0\n  fmul.s f2,f0,f0   # square\n\n"
            .parse::<Trace>()
            .unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.insts[1].text, "fmul.s f2,f0,f0");
    }

    #[test]
    fn test_reports_line() {
        let err = "add x1,x2,x3\n\nfadd.s f1,f2,x3\n"
            .parse::<Trace>()
            .unwrap_err();
        assert_eq!(err.line, 3);
        assert!(matches!(err.source, InstError::WrongRegClass { .. }));
        assert_eq!(
            err.to_string(),
            "error parsing trace line 3: fadd.s f1,f2,x3: instruction has invalid register 'x3'"
        );
    }

    #[test]
    fn test_empty() {
        assert!("".parse::<Trace>().unwrap().is_empty());
        assert!("\n# nothing\n".parse::<Trace>().unwrap().is_empty());
    }
}
