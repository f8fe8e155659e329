use std::{fmt, str::FromStr};

use crate::{MatchError, ParseError, Rule};

/// An ordered deny list of [`Rule`]s.
///
/// Rules are kept sorted and structurally deduplicated, so a filter has one
/// canonical text form and set-equality is plain equality. A frame matches
/// the filter if it matches any rule; the surrounding node treats a match
/// as "drop" and everything else as "allow".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    rules: Vec<Rule>,
}

impl Filter {
    /// Creates an empty filter, which matches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule, keeping the list sorted. Adding a rule that is already
    /// present is a no-op.
    pub fn add(&mut self, rule: Rule) {
        if let Err(position) = self.rules.binary_search(&rule) {
            self.rules.insert(position, rule);
        }
    }

    /// The rules in canonical (sorted) order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the filter holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Tests a frame against every rule; true if any rule matches.
    ///
    /// Walk failures propagate so the caller can decide what to do with a
    /// frame the classifier cannot make sense of.
    pub fn matches(&self, ether_type: u32, header: &[u8]) -> Result<bool, MatchError> {
        for rule in &self.rules {
            if rule.matches(ether_type, header)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl FromStr for Filter {
    type Err = ParseError;

    /// Parses a comma-joined rule list. Failures name the 0-based index of
    /// the rule that could not be parsed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut filter = Self::new();
        if s.trim().is_empty() {
            return Ok(filter);
        }

        for (index, rule) in s.split(',').enumerate() {
            filter.add(Rule::parse_indexed(rule, index)?);
        }
        Ok(filter)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{rule}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers;

    #[test]
    fn add_is_idempotent() {
        let rule: Rule = "2048;6;443".parse().unwrap();

        let mut filter = Filter::new();
        filter.add(rule);
        filter.add(rule);

        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn rules_stay_sorted() {
        let mut filter = Filter::new();
        filter.add("34525;17;53".parse().unwrap());
        filter.add("2048;6;443".parse().unwrap());
        filter.add("2048;1;*".parse().unwrap());

        assert_eq!(filter.to_string(), "2048;1;*,2048;6;443,34525;17;53");
    }

    #[test]
    fn round_trip_is_exact() {
        let text = "2048;1;*,2048;6;443,34525;17;53";
        let filter: Filter = text.parse().unwrap();

        assert_eq!(filter.to_string(), text);
        assert_eq!(text.parse::<Filter>().unwrap(), filter);
    }

    #[test]
    fn round_trip_canonicalizes_order_and_duplicates() {
        let filter: Filter = "2048;6;443,2048;1;*,2048;6;443".parse().unwrap();

        assert_eq!(filter.len(), 2);
        assert_eq!(filter.to_string(), "2048;1;*,2048;6;443");
    }

    #[test]
    fn empty_text_is_the_empty_filter() {
        let filter: Filter = "".parse().unwrap();
        assert!(filter.is_empty());
        assert_eq!(filter.to_string(), "");
    }

    #[test]
    fn parse_error_names_the_rule_index() {
        let err = "2048;6;443,1;2".parse::<Filter>().unwrap_err();
        assert_eq!(err, ParseError::FieldCount { index: 1, found: 2 });
    }

    #[test]
    fn matches_any_rule() {
        let filter: Filter = "*;6;22,*;6;23".parse().unwrap();

        let mut frame = vec![0u8; 24];
        frame[0] = 0x45;
        frame[9] = 6;
        frame[22..24].copy_from_slice(&23u16.to_be_bytes());

        assert_eq!(filter.matches(headers::ETHERTYPE_IPV4, &frame), Ok(true));

        frame[22..24].copy_from_slice(&25u16.to_be_bytes());
        assert_eq!(filter.matches(headers::ETHERTYPE_IPV4, &frame), Ok(false));
    }

    #[test]
    fn match_errors_propagate() {
        let filter: Filter = "*;6;22".parse().unwrap();
        assert!(filter.matches(headers::ETHERTYPE_IPV4, &[0u8; 4]).is_err());
    }
}
