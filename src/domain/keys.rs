use std::{fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;

const COURSE_PREFIX: &str = "course-v1:";
const BLOCK_PREFIX: &str = "block-v1:";

/// A validated segment of a course or usage key.
///
/// Segments are non-empty and may contain ASCII alphanumerics and the
/// characters `_`, `-`, `.`, `~` and `:`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeySegment(NonEmptyString);

impl KeySegment {
    /// Creates a new `KeySegment` from a string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSegmentError` if the string is empty or contains
    /// characters that are reserved by the key syntax.
    pub fn new(s: String) -> Result<Self, InvalidSegmentError> {
        let non_empty =
            NonEmptyString::new(s.clone()).map_err(|_| InvalidSegmentError(s.clone()))?;

        if !s.chars().all(is_segment_char) {
            return Err(InvalidSegmentError(s));
        }

        Ok(Self(non_empty))
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

const fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '~' | ':')
}

impl TryFrom<&str> for KeySegment {
    type Error = InvalidSegmentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl Deref for KeySegment {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a key segment is empty or contains reserved
/// characters.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid key segment '{0}': must be non-empty and contain only [A-Za-z0-9_.~:-]")]
pub struct InvalidSegmentError(String);

/// Identifies a course run.
///
/// Format: `course-v1:{ORG}+{COURSE}+{RUN}`. The deprecated slash form
/// `{ORG}/{COURSE}/{RUN}` is accepted on input and preserved on output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CourseKey {
    org: KeySegment,
    course: KeySegment,
    run: KeySegment,
    deprecated: bool,
}

impl CourseKey {
    /// Create a course key from pre-validated segments.
    #[must_use]
    pub const fn new(org: KeySegment, course: KeySegment, run: KeySegment) -> Self {
        Self {
            org,
            course,
            run,
            deprecated: false,
        }
    }

    /// The organisation that owns the course.
    #[must_use]
    pub fn org(&self) -> &str {
        self.org.as_str()
    }

    /// The course number.
    #[must_use]
    pub fn course(&self) -> &str {
        self.course.as_str()
    }

    /// The course run.
    #[must_use]
    pub fn run(&self) -> &str {
        self.run.as_str()
    }

    /// Build a usage key for a block of the given type inside this course.
    #[must_use]
    pub fn make_usage_key(&self, block_type: KeySegment, block_id: KeySegment) -> UsageKey {
        UsageKey {
            course_key: self.clone(),
            block_type,
            block_id,
        }
    }

    fn parse_parts(s: &str, separator: char) -> Result<(KeySegment, KeySegment, KeySegment), Error> {
        let parts: Vec<&str> = s.split(separator).collect();
        let [org, course, run] = parts.as_slice() else {
            return Err(Error::Syntax(s.to_string()));
        };
        Ok((
            KeySegment::try_from(*org)?,
            KeySegment::try_from(*course)?,
            KeySegment::try_from(*run)?,
        ))
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.deprecated {
            write!(f, "{}/{}/{}", self.org, self.course, self.run)
        } else {
            write!(f, "{COURSE_PREFIX}{}+{}+{}", self.org, self.course, self.run)
        }
    }
}

impl FromStr for CourseKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix(COURSE_PREFIX) {
            let (org, course, run) = Self::parse_parts(rest, '+')?;
            return Ok(Self::new(org, course, run));
        }

        if s.contains('/') {
            let (org, course, run) = Self::parse_parts(s, '/')?;
            return Ok(Self {
                deprecated: true,
                ..Self::new(org, course, run)
            });
        }

        Err(Error::Syntax(s.to_string()))
    }
}

impl TryFrom<&str> for CourseKey {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

/// Identifies one usage of a block inside a course.
///
/// Format: `block-v1:{ORG}+{COURSE}+{RUN}+type@{TYPE}+block@{ID}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UsageKey {
    course_key: CourseKey,
    block_type: KeySegment,
    block_id: KeySegment,
}

impl UsageKey {
    /// The course this usage belongs to.
    #[must_use]
    pub const fn course_key(&self) -> &CourseKey {
        &self.course_key
    }

    /// The block type, e.g. `discussion`.
    #[must_use]
    pub fn block_type(&self) -> &str {
        self.block_type.as_str()
    }

    /// The block id, i.e. the OLX `url_name`.
    #[must_use]
    pub fn block_id(&self) -> &str {
        self.block_id.as_str()
    }

    /// The key used to look this usage up in a course policy document.
    ///
    /// For example `discussion/week1_forum`.
    #[must_use]
    pub fn policy_key(&self) -> String {
        format!("{}/{}", self.block_type, self.block_id)
    }
}

impl fmt::Display for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let CourseKey {
            org, course, run, ..
        } = &self.course_key;
        write!(
            f,
            "{BLOCK_PREFIX}{org}+{course}+{run}+type@{}+block@{}",
            self.block_type, self.block_id
        )
    }
}

impl FromStr for UsageKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(BLOCK_PREFIX)
            .ok_or_else(|| Error::Syntax(s.to_string()))?;

        let parts: Vec<&str> = rest.split('+').collect();
        let [org, course, run, block_type, block_id] = parts.as_slice() else {
            return Err(Error::Syntax(s.to_string()));
        };

        let block_type = block_type
            .strip_prefix("type@")
            .ok_or_else(|| Error::Syntax(s.to_string()))?;
        let block_id = block_id
            .strip_prefix("block@")
            .ok_or_else(|| Error::Syntax(s.to_string()))?;

        let course_key = CourseKey::new(
            KeySegment::try_from(*org)?,
            KeySegment::try_from(*course)?,
            KeySegment::try_from(*run)?,
        );

        Ok(course_key.make_usage_key(
            KeySegment::try_from(block_type)?,
            KeySegment::try_from(block_id)?,
        ))
    }
}

impl TryFrom<&str> for UsageKey {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

/// Errors that can occur while parsing course or usage keys.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The key does not have the expected structure.
    #[error("Invalid key format: {0}")]
    Syntax(String),

    /// One of the key segments is invalid.
    #[error(transparent)]
    Segment(#[from] InvalidSegmentError),
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn course_key_parses_modern_form() {
        let key = CourseKey::try_from("course-v1:edX+DemoX+2024_T1").unwrap();
        assert_eq!(key.org(), "edX");
        assert_eq!(key.course(), "DemoX");
        assert_eq!(key.run(), "2024_T1");
        assert_eq!(key.to_string(), "course-v1:edX+DemoX+2024_T1");
    }

    #[test]
    fn course_key_preserves_deprecated_form() {
        let key = CourseKey::try_from("edX/DemoX/Demo_Course").unwrap();
        assert_eq!(key.run(), "Demo_Course");
        assert_eq!(key.to_string(), "edX/DemoX/Demo_Course");
    }

    #[test_case("course-v1:edX+DemoX"; "missing run")]
    #[test_case("course-v1:edX++2024"; "empty course")]
    #[test_case("course-v1:edX+Demo X+2024"; "whitespace")]
    #[test_case("edX+DemoX+2024"; "missing prefix")]
    #[test_case(""; "empty")]
    fn course_key_rejects_malformed(input: &str) {
        assert!(CourseKey::try_from(input).is_err());
    }

    #[test]
    fn usage_key_round_trips_and_derives_course() {
        let raw = "block-v1:edX+DemoX+2024_T1+type@discussion+block@week1_forum";
        let key = UsageKey::try_from(raw).unwrap();

        assert_eq!(key.block_type(), "discussion");
        assert_eq!(key.block_id(), "week1_forum");
        assert_eq!(key.course_key().to_string(), "course-v1:edX+DemoX+2024_T1");
        assert_eq!(key.policy_key(), "discussion/week1_forum");
        assert_eq!(key.to_string(), raw);
    }

    #[test]
    fn usage_key_from_deprecated_course_uses_modern_display() {
        let course = CourseKey::try_from("edX/DemoX/Demo_Course").unwrap();
        let usage = course.make_usage_key(
            KeySegment::try_from("discussion").unwrap(),
            KeySegment::try_from("abc").unwrap(),
        );
        assert_eq!(
            usage.to_string(),
            "block-v1:edX+DemoX+Demo_Course+type@discussion+block@abc"
        );
    }

    #[test_case("block-v1:edX+DemoX+2024+discussion+block@abc"; "missing type tag")]
    #[test_case("block-v1:edX+DemoX+2024+type@discussion"; "missing block")]
    #[test_case("course-v1:edX+DemoX+2024"; "course key")]
    fn usage_key_rejects_malformed(input: &str) {
        assert!(UsageKey::try_from(input).is_err());
    }
}
