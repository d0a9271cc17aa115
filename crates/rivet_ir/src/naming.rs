//! Signal, port, and instance name handling.
//!
//! All user-visible names pass through [`sanitize`] when rivet may repair
//! them, or [`validate`] when they must already be legal (port names).
//! [`Uniquifier`] resolves collisions when instance and port names are
//! finalized during build.

use std::collections::HashMap;

/// Errors from name validation and uniquification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NameError {
    /// The name is empty.
    #[error("name must not be empty")]
    Empty,
    /// The name contains illegal characters or starts with a digit.
    #[error("name `{name}` is not a legal identifier")]
    Illegal {
        /// The offending name.
        name: String,
    },
    /// The name collides with a language keyword.
    #[error("name `{name}` is a reserved word")]
    Reserved {
        /// The offending name.
        name: String,
    },
    /// A reserved name collided with an existing name during uniquification.
    #[error("reserved name `{name}` is already taken")]
    ReservedCollision {
        /// The offending name.
        name: String,
    },
}

/// Keywords that may never be used as port or instance names.
const RESERVED_WORDS: &[&str] = &[
    "always", "assign", "begin", "case", "casex", "casez", "default", "else",
    "end", "endcase", "endmodule", "for", "function", "if", "initial", "inout",
    "input", "logic", "module", "negedge", "output", "parameter", "posedge",
    "reg", "wire",
];

fn is_legal_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Repairs a name into a legal identifier.
///
/// Illegal characters become `_`; a leading digit gains a `_` prefix; an
/// empty input becomes `s`.
pub fn sanitize(name: &str) -> String {
    if name.is_empty() {
        return "s".to_string();
    }
    let mut out = String::with_capacity(name.len() + 1);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if i == 0 && c.is_ascii_digit() {
                out.push('_');
            }
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

/// Validates that a name is a legal, non-reserved identifier.
///
/// Used for port names, which the user must get right rather than have
/// silently repaired.
pub fn validate(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if !is_legal_identifier(name) {
        return Err(NameError::Illegal {
            name: name.to_string(),
        });
    }
    if RESERVED_WORDS.contains(&name) {
        return Err(NameError::Reserved {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Resolves name collisions within one namespace.
///
/// The first request for a name keeps it; later requests get `_N` suffixes.
/// Reserved requests must win their exact name or fail.
#[derive(Debug, Default)]
pub struct Uniquifier {
    taken: HashMap<String, u32>,
}

impl Uniquifier {
    /// Creates an empty uniquifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a unique name derived from `requested`.
    ///
    /// When `reserved` is set the exact name must be free, otherwise a
    /// [`NameError::ReservedCollision`] is returned.
    pub fn claim(&mut self, requested: &str, reserved: bool) -> Result<String, NameError> {
        if self.taken.contains_key(requested) {
            if reserved {
                return Err(NameError::ReservedCollision {
                    name: requested.to_string(),
                });
            }
            let mut n = self.taken[requested];
            loop {
                n += 1;
                let candidate = format!("{requested}_{n}");
                if !self.taken.contains_key(&candidate) {
                    self.taken.insert(requested.to_string(), n);
                    self.taken.insert(candidate.clone(), 0);
                    return Ok(candidate);
                }
            }
        }
        self.taken.insert(requested.to_string(), 0);
        Ok(requested.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_passthrough() {
        assert_eq!(sanitize("clk"), "clk");
        assert_eq!(sanitize("data_in"), "data_in");
    }

    #[test]
    fn sanitize_replaces_illegal_chars() {
        assert_eq!(sanitize("a-b.c"), "a_b_c");
        assert_eq!(sanitize("my sig"), "my_sig");
    }

    #[test]
    fn sanitize_leading_digit() {
        assert_eq!(sanitize("2bit"), "_2bit");
    }

    #[test]
    fn sanitize_empty() {
        assert_eq!(sanitize(""), "s");
    }

    #[test]
    fn validate_legal() {
        assert!(validate("clk").is_ok());
        assert!(validate("_internal").is_ok());
        assert!(validate("q2").is_ok());
    }

    #[test]
    fn validate_empty() {
        assert_eq!(validate(""), Err(NameError::Empty));
    }

    #[test]
    fn validate_illegal() {
        assert!(matches!(validate("2bit"), Err(NameError::Illegal { .. })));
        assert!(matches!(validate("a-b"), Err(NameError::Illegal { .. })));
    }

    #[test]
    fn validate_reserved() {
        assert!(matches!(validate("module"), Err(NameError::Reserved { .. })));
        assert!(matches!(validate("input"), Err(NameError::Reserved { .. })));
    }

    #[test]
    fn uniquifier_first_keeps_name() {
        let mut u = Uniquifier::new();
        assert_eq!(u.claim("ff", false).unwrap(), "ff");
        assert_eq!(u.claim("ff", false).unwrap(), "ff_1");
        assert_eq!(u.claim("ff", false).unwrap(), "ff_2");
    }

    #[test]
    fn uniquifier_skips_explicitly_taken_suffix() {
        let mut u = Uniquifier::new();
        assert_eq!(u.claim("ff_1", false).unwrap(), "ff_1");
        assert_eq!(u.claim("ff", false).unwrap(), "ff");
        assert_eq!(u.claim("ff", false).unwrap(), "ff_2");
    }

    #[test]
    fn uniquifier_reserved_wins_when_free() {
        let mut u = Uniquifier::new();
        assert_eq!(u.claim("top", true).unwrap(), "top");
    }

    #[test]
    fn uniquifier_reserved_collision_fails() {
        let mut u = Uniquifier::new();
        u.claim("top", false).unwrap();
        assert_eq!(
            u.claim("top", true),
            Err(NameError::ReservedCollision {
                name: "top".to_string()
            })
        );
    }
}
