//! Alternative names for emulator operations.
//!
//! The alias methods below are plain forwarding calls. [`Emulator::call`]
//! additionally dispatches by name through a fixed table, so scripted steps
//! such as `andSee` or `seePageIs` reach the same operations.

use crate::emulator::Emulator;
use crate::errors::{EmulatorError, Result};
use crate::types::FormData;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

impl Emulator {
    pub async fn follow(&mut self, text: &str) -> Result<&mut Self> {
        self.click(text).await
    }

    pub async fn fill(&mut self, text: &str, element: &str) -> Result<&mut Self> {
        self.type_text(text, element).await
    }

    pub async fn tick(&mut self, element: &str) -> Result<&mut Self> {
        self.check(element).await
    }

    pub fn on_page(&mut self, path: &str) -> Result<&mut Self> {
        self.see_page_is(path)
    }

    pub fn verify_in_database(&mut self, table: &str, fields: Value) -> Result<&mut Self> {
        self.see_in_database(table, fields)
    }

    pub async fn hit(&mut self, path: &str) -> Result<&mut Self> {
        self.get(path).await
    }

    pub fn see_status_code_is(&mut self, code: u16) -> Result<&mut Self> {
        self.see_status_code(code)
    }

    pub fn see_is_json(&mut self) -> Result<&mut Self> {
        self.see_json()
    }
}

/// Canonical operations reachable through [`Emulator::call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Visit,
    See,
    SeePageIs,
    Click,
    Type,
    Check,
    Uncheck,
    Select,
    AttachFile,
    Press,
    SubmitForm,
    SeeFile,
    SeeInDatabase,
    Wait,
    SeeInAlert,
    AcceptAlert,
    Snap,
    Get,
    Post,
    Put,
    Patch,
    Delete,
    SeeJson,
    SeeStatusCode,
    SeeJsonEquals,
    SeeJsonContains,
}

/// Names are compared lowercased with underscores removed.
static ALIASES: &[(&str, Operation)] = &[
    ("visit", Operation::Visit),
    ("see", Operation::See),
    ("seepageis", Operation::SeePageIs),
    ("onpage", Operation::SeePageIs),
    ("click", Operation::Click),
    ("follow", Operation::Click),
    ("type", Operation::Type),
    ("typetext", Operation::Type),
    ("fill", Operation::Type),
    ("check", Operation::Check),
    ("tick", Operation::Check),
    ("uncheck", Operation::Uncheck),
    ("select", Operation::Select),
    ("attachfile", Operation::AttachFile),
    ("press", Operation::Press),
    ("submitform", Operation::SubmitForm),
    ("seefile", Operation::SeeFile),
    ("seeindatabase", Operation::SeeInDatabase),
    ("verifyindatabase", Operation::SeeInDatabase),
    ("wait", Operation::Wait),
    ("seeinalert", Operation::SeeInAlert),
    ("acceptalert", Operation::AcceptAlert),
    ("snap", Operation::Snap),
    ("get", Operation::Get),
    ("hit", Operation::Get),
    ("post", Operation::Post),
    ("put", Operation::Put),
    ("patch", Operation::Patch),
    ("delete", Operation::Delete),
    ("seejson", Operation::SeeJson),
    ("seeisjson", Operation::SeeJson),
    ("seestatuscode", Operation::SeeStatusCode),
    ("seestatuscodeis", Operation::SeeStatusCode),
    ("seejsonequals", Operation::SeeJsonEquals),
    ("seejsoncontains", Operation::SeeJsonContains),
];

impl Operation {
    /// Look `name` up in the alias table, allowing a leading `and`.
    pub fn resolve(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        Self::lookup(&normalized).or_else(|| {
            normalized
                .strip_prefix("and")
                .filter(|rest| !rest.is_empty())
                .and_then(Self::lookup)
        })
    }

    fn lookup(name: &str) -> Option<Self> {
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, op)| *op)
    }

    /// Minimum and maximum number of string arguments.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Operation::AcceptAlert | Operation::SeeJson => (0, 0),
            Operation::Snap => (0, 1),
            Operation::SubmitForm => (0, 2),
            Operation::SeeInAlert => (1, 2),
            Operation::Type
            | Operation::Select
            | Operation::AttachFile
            | Operation::SeeInDatabase
            | Operation::Post
            | Operation::Put
            | Operation::Patch => (2, 2),
            _ => (1, 1),
        }
    }
}

fn invalid(name: &str, expected: impl Into<String>) -> EmulatorError {
    EmulatorError::InvalidArguments {
        operation: name.to_string(),
        expected: expected.into(),
    }
}

fn parse_json(name: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| invalid(name, format!("JSON ({})", e)))
}

impl Emulator {
    /// Run the operation called `name` with string arguments.
    ///
    /// JSON arguments (database rows, request bodies, expected responses) are
    /// given as JSON text.
    pub async fn call(&mut self, name: &str, args: &[&str]) -> Result<&mut Self> {
        let op = Operation::resolve(name)
            .ok_or_else(|| EmulatorError::UnknownOperation(name.to_string()))?;

        let (min, max) = op.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                format!("{} argument(s), got {}", min, args.len())
            } else {
                format!("{} to {} arguments, got {}", min, max, args.len())
            };
            return Err(invalid(name, expected));
        }
        debug!("Calling {:?} as '{}'", op, name);

        let arg = |i: usize| args.get(i).copied().unwrap_or_default();

        match op {
            Operation::Visit => self.visit(arg(0)).await?,
            Operation::See => self.see(arg(0))?,
            Operation::SeePageIs => self.see_page_is(arg(0))?,
            Operation::Click => self.click(arg(0)).await?,
            Operation::Type => self.type_text(arg(0), arg(1)).await?,
            Operation::Check => self.check(arg(0)).await?,
            Operation::Uncheck => self.uncheck(arg(0)).await?,
            Operation::Select => self.select(arg(0), arg(1)).await?,
            Operation::AttachFile => self.attach_file(arg(0), arg(1)).await?,
            Operation::Press => self.press(arg(0)).await?,
            Operation::SubmitForm => {
                let button = args.first().copied().filter(|b| !b.is_empty());
                let data: FormData = match args.get(1) {
                    Some(raw) => serde_json::from_str(raw)
                        .map_err(|e| invalid(name, format!("form data as JSON ({})", e)))?,
                    None => FormData::new(),
                };
                self.submit_form(button, data).await?
            }
            Operation::SeeFile => self.see_file(Path::new(arg(0)))?,
            Operation::SeeInDatabase => {
                let fields = parse_json(name, arg(1))?;
                self.see_in_database(arg(0), fields)?
            }
            Operation::Wait => {
                let seconds: u64 = arg(0)
                    .parse()
                    .map_err(|_| invalid(name, "a whole number of seconds"))?;
                self.wait(seconds).await?
            }
            Operation::SeeInAlert => {
                let accept: bool = match args.get(1) {
                    Some(raw) => raw
                        .parse()
                        .map_err(|_| invalid(name, "true or false for accept"))?,
                    None => true,
                };
                self.see_in_alert(arg(0), accept).await?
            }
            Operation::AcceptAlert => self.accept_alert().await?,
            Operation::Snap => self.snap(args.first().map(Path::new)).await?,
            Operation::Get => self.get(arg(0)).await?,
            Operation::Post => {
                let data = parse_json(name, arg(1))?;
                self.post(arg(0), data).await?
            }
            Operation::Put => {
                let data = parse_json(name, arg(1))?;
                self.put(arg(0), data).await?
            }
            Operation::Patch => {
                let data = parse_json(name, arg(1))?;
                self.patch(arg(0), data).await?
            }
            Operation::Delete => self.delete(arg(0)).await?,
            Operation::SeeJson => self.see_json()?,
            Operation::SeeStatusCode => {
                let code: u16 = arg(0)
                    .parse()
                    .map_err(|_| invalid(name, "a numeric status code"))?;
                self.see_status_code(code)?
            }
            Operation::SeeJsonEquals => {
                let expected = parse_json(name, arg(0))?;
                self.see_json_equals(expected)?
            }
            Operation::SeeJsonContains => {
                let fragment = parse_json(name, arg(0))?;
                self.see_json_contains(fragment)?
            }
        };

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    #[test]
    fn test_resolve_handles_case_underscores_and_prefix() {
        assert_eq!(Operation::resolve("see"), Some(Operation::See));
        assert_eq!(Operation::resolve("andSee"), Some(Operation::See));
        assert_eq!(Operation::resolve("andSeePageIs"), Some(Operation::SeePageIs));
        assert_eq!(Operation::resolve("on_page"), Some(Operation::SeePageIs));
        assert_eq!(Operation::resolve("and_follow"), Some(Operation::Click));
        assert_eq!(Operation::resolve("verifyInDatabase"), Some(Operation::SeeInDatabase));
        assert_eq!(Operation::resolve("and"), None);
        assert_eq!(Operation::resolve("andFly"), None);
    }

    #[test]
    fn test_every_alias_resolves_to_itself() {
        for (alias, op) in ALIASES {
            assert_eq!(Operation::resolve(alias), Some(*op), "{}", alias);
        }
    }

    #[tokio::test]
    async fn test_call_rejects_unknown_names_and_bad_arity() {
        let mut emulator = Emulator::crawler(Config::default());

        let unknown = emulator.call("andFly", &[]).await;
        assert!(matches!(
            unknown,
            Err(EmulatorError::UnknownOperation(ref name)) if name == "andFly"
        ));

        let arity = emulator.call("type", &["alice"]).await;
        assert!(matches!(arity, Err(EmulatorError::InvalidArguments { .. })));

        let bad_number = emulator.call("seeStatusCode", &["ok"]).await;
        assert!(matches!(bad_number, Err(EmulatorError::InvalidArguments { .. })));
    }
}
