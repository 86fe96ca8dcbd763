//! Shared error types across pdp crates.
//!
//! Evaluation, construction and update errors carry a stable numeric id and
//! the source path they were raised at. Each layer an error passes through
//! binds its own description with [`PathError::bind`], so the rendered
//! message reads outermost first: `#05 (policy "p">rule "r">condition): ...`.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::types::Type;

const PATH_SEPARATOR: &str = ">";

/// Stable error codes (API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Value can't be built from its payload.
    InvalidValue,
    /// Policy tree or expression can't be built.
    InvalidPolicy,
    /// Request evaluation failed.
    EvaluationFailed,
    /// Update tag doesn't match the live snapshot.
    TagMismatch,
    /// Update can't be applied.
    UpdateRejected,
    /// Malformed configuration.
    BadConfig,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Internal failure (I/O and alike).
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::InvalidPolicy => "INVALID_POLICY",
            ErrorCode::EvaluationFailed => "EVALUATION_FAILED",
            ErrorCode::TagMismatch => "TAG_MISMATCH",
            ErrorCode::UpdateRejected => "UPDATE_REJECTED",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Error kinds that can be carried by [`PathError`].
pub trait ErrorKind: fmt::Display {
    /// Numeric id rendered as `#NN`.
    fn id(&self) -> u8;
}

/// Error kind plus the path of sources it passed through.
#[derive(Debug, Clone, PartialEq)]
pub struct PathError<K> {
    kind: K,
    // innermost first; rendered reversed
    path: Vec<String>,
}

pub type EvalError = PathError<EvalErrorKind>;
pub type BuildError = PathError<BuildErrorKind>;
pub type UpdateError = PathError<UpdateErrorKind>;

impl<K: ErrorKind> PathError<K> {
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            path: Vec::new(),
        }
    }

    /// Prepend `src` to the error path.
    pub fn bind(mut self, src: impl Into<String>) -> Self {
        self.path.push(src.into());
        self
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn id(&self) -> u8 {
        self.kind.id()
    }

    /// Path from the outermost source to the innermost one.
    pub fn path(&self) -> Vec<&str> {
        self.path.iter().rev().map(String::as_str).collect()
    }
}

impl<K: ErrorKind> From<K> for PathError<K> {
    fn from(kind: K) -> Self {
        PathError::new(kind)
    }
}

impl<K: ErrorKind> fmt::Display for PathError<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return write!(f, "#{:02x}: {}", self.kind.id(), self.kind);
        }
        write!(
            f,
            "#{:02x} ({}): {}",
            self.kind.id(),
            self.path().join(PATH_SEPARATOR),
            self.kind
        )
    }
}

impl<K: ErrorKind + fmt::Debug> std::error::Error for PathError<K> {}

impl EvalError {
    /// Collapses several child errors into one.
    pub fn multi(mut errs: Vec<EvalError>) -> Self {
        if errs.len() == 1 {
            if let Some(e) = errs.pop() {
                return e;
            }
        }
        EvalError::new(EvalErrorKind::Multi(errs))
    }

    /// True for "missing value" style failures (absent content entry).
    pub fn is_missing_value(&self) -> bool {
        matches!(self.kind, EvalErrorKind::MissingValue)
    }
}

fn join_errors(errs: &[EvalError]) -> String {
    errs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Value construction failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("can't convert {text:?} to boolean")]
    InvalidBoolean { text: String },
    #[error("can't convert {text:?} to integer")]
    InvalidInteger { text: String },
    #[error("can't convert {text:?} to float")]
    InvalidFloat { text: String },
    #[error("{0} overflows integer")]
    IntegerOverflow(f64),
    #[error("{0} has a fractional part")]
    FractionalInteger(f64),
    #[error("can't convert {text:?} to address")]
    InvalidAddress { text: String },
    #[error("can't convert {text:?} to network: {reason}")]
    InvalidNetwork { text: String, reason: String },
    #[error("can't convert {text:?} to domain: {reason}")]
    InvalidDomain { text: String, reason: String },
    #[error("can't convert {text:?} to {ty}: {reason}")]
    InvalidCollection {
        text: String,
        ty: Type,
        reason: String,
    },
    #[error("unknown type {0:?}")]
    UnknownType(String),
}

/// Evaluation-time failures. Never abort a decision; they end up as the
/// status of an Indeterminate response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalErrorKind {
    #[error("{0}")]
    External(String),
    #[error("multiple errors: {}", join_errors(.0))]
    Multi(Vec<EvalError>),
    #[error("Missing attribute")]
    MissingAttribute,
    #[error("Missing value")]
    MissingValue,
    #[error("Expected {expected} value but got {actual}")]
    ValueType { expected: Type, actual: Type },
    #[error("Expected String, Set of Strings or List of Strings as argument but got {0}")]
    MapperArgumentType(Type),
    #[error("Missing content {0:?}")]
    MissingContent(String),
    #[error("Missing content item {0:?}")]
    MissingContentItem(String),
    #[error("Invalid content item type. Expected {expected} but got {actual}")]
    InvalidContentItemType { expected: Type, actual: Type },
    #[error("Invalid selector path. Expected {expected} path item(s) but got {actual}")]
    InvalidSelectorPath { expected: usize, actual: usize },
    #[error("Invalid key at level {level}. Expected {expected} but got {actual}")]
    InvalidContentKey {
        level: usize,
        expected: &'static str,
        actual: Type,
    },
    #[error("Expected map but got value")]
    MapContentSubitem,
    #[error("Function {name:?} doesn't accept arguments of types: {args}")]
    FunctionCast { name: String, args: String },
    #[error("Integer divisor has a value of 0")]
    IntegerDivideByZero,
    #[error("Integer result overflows")]
    IntegerOverflow,
    #[error("Float divisor has a value of 0")]
    FloatDivideByZero,
    #[error("Float result has a value of {0}")]
    FloatNotFinite(&'static str),
    #[error("Shard {shard:?} resolver failed: {reason}")]
    ShardResolver { shard: String, reason: String },
}

impl ErrorKind for EvalErrorKind {
    fn id(&self) -> u8 {
        match self {
            EvalErrorKind::External(_) => 0x00,
            EvalErrorKind::Multi(_) => 0x01,
            EvalErrorKind::MissingAttribute => 0x02,
            EvalErrorKind::MissingValue => 0x03,
            EvalErrorKind::ValueType { .. } => 0x04,
            EvalErrorKind::MapperArgumentType(_) => 0x05,
            EvalErrorKind::MissingContent(_) => 0x06,
            EvalErrorKind::MissingContentItem(_) => 0x07,
            EvalErrorKind::InvalidContentItemType { .. } => 0x08,
            EvalErrorKind::InvalidSelectorPath { .. } => 0x09,
            EvalErrorKind::InvalidContentKey { .. } => 0x0a,
            EvalErrorKind::MapContentSubitem => 0x0b,
            EvalErrorKind::FunctionCast { .. } => 0x0c,
            EvalErrorKind::IntegerDivideByZero => 0x0d,
            EvalErrorKind::IntegerOverflow => 0x0e,
            EvalErrorKind::FloatDivideByZero => 0x0f,
            EvalErrorKind::FloatNotFinite(_) => 0x10,
            EvalErrorKind::ShardResolver { .. } => 0x11,
        }
    }
}

/// Construction-time failures. Fatal to the policy version being loaded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildErrorKind {
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("unknown combining algorithm {0:?}")]
    UnknownAlgorithm(String),
    #[error("algorithm {0:?} is already registered")]
    DuplicateAlgorithm(String),
    #[error("algorithm {alg:?} requires parameter {param:?}")]
    MissingAlgorithmParam { alg: String, param: &'static str },
    #[error("algorithm {0:?} doesn't accept parameters")]
    UnexpectedAlgorithmParams(String),
    #[error("mapper can't be used as a mapper sub-algorithm")]
    NestedMapper,
    #[error("Expected String, Set of Strings or List of Strings as mapper argument but got {0}")]
    MapperArgumentType(Type),
    #[error("{role} {id:?} doesn't match any sibling")]
    DanglingSibling { role: &'static str, id: String },
    #[error("duplicate child id {0:?}")]
    DuplicateId(String),
    #[error("ambiguous node: {0}")]
    AmbiguousNode(&'static str),
    #[error("policy tree is deeper than {0} levels")]
    TooDeep(usize),
    #[error("attribute {0:?} isn't declared")]
    UndeclaredAttribute(String),
    #[error("attribute {0:?} is already declared")]
    DuplicateAttribute(String),
    #[error("can't assign {actual} value to {expected} attribute {id:?}")]
    AssignmentType {
        id: String,
        expected: Type,
        actual: Type,
    },
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("function {name:?} doesn't accept arguments of types: {args}")]
    FunctionCast { name: String, args: String },
    #[error("condition must be Boolean but got {0}")]
    ConditionType(Type),
    #[error("match needs one constant and one attribute operand")]
    MatchOperands,
    #[error("match function {name:?} returns {actual} instead of Boolean")]
    MatchResultType { name: String, actual: Type },
    #[error("invalid content URI {0:?}")]
    InvalidContentUri(String),
    #[error("selector {which} must be {expected} but got {actual}")]
    SelectorFallbackType {
        which: &'static str,
        expected: Type,
        actual: Type,
    },
    #[error("selector path item of type {0} can't be a content key")]
    SelectorKeyType(Type),
    #[error("aggregation needs List of Strings result but got {0}")]
    AggregationType(Type),
    #[error("{0} needs immediate patterns")]
    PatternNotImmediate(String),
    #[error("invalid regular expression {pattern:?}: {reason}")]
    InvalidRegex { pattern: String, reason: String },
    #[error("invalid wildcard pattern {0:?}: dangling escape")]
    InvalidWildcard(String),
    #[error("invalid content item: {0}")]
    InvalidContentItem(String),
}

impl ErrorKind for BuildErrorKind {
    fn id(&self) -> u8 {
        match self {
            BuildErrorKind::Value(_) => 0x20,
            BuildErrorKind::UnknownAlgorithm(_) => 0x21,
            BuildErrorKind::DuplicateAlgorithm(_) => 0x22,
            BuildErrorKind::MissingAlgorithmParam { .. } => 0x23,
            BuildErrorKind::UnexpectedAlgorithmParams(_) => 0x24,
            BuildErrorKind::NestedMapper => 0x25,
            BuildErrorKind::MapperArgumentType(_) => 0x26,
            BuildErrorKind::DanglingSibling { .. } => 0x27,
            BuildErrorKind::DuplicateId(_) => 0x28,
            BuildErrorKind::AmbiguousNode(_) => 0x29,
            BuildErrorKind::TooDeep(_) => 0x2a,
            BuildErrorKind::UndeclaredAttribute(_) => 0x2b,
            BuildErrorKind::DuplicateAttribute(_) => 0x2c,
            BuildErrorKind::AssignmentType { .. } => 0x2d,
            BuildErrorKind::UnknownFunction(_) => 0x2e,
            BuildErrorKind::FunctionCast { .. } => 0x2f,
            BuildErrorKind::ConditionType(_) => 0x30,
            BuildErrorKind::MatchOperands => 0x31,
            BuildErrorKind::MatchResultType { .. } => 0x32,
            BuildErrorKind::InvalidContentUri(_) => 0x33,
            BuildErrorKind::SelectorFallbackType { .. } => 0x34,
            BuildErrorKind::SelectorKeyType(_) => 0x35,
            BuildErrorKind::AggregationType(_) => 0x36,
            BuildErrorKind::PatternNotImmediate(_) => 0x37,
            BuildErrorKind::InvalidRegex { .. } => 0x38,
            BuildErrorKind::InvalidContentItem(_) => 0x39,
            BuildErrorKind::InvalidWildcard(_) => 0x3a,
        }
    }
}

impl From<ValueError> for BuildError {
    fn from(e: ValueError) -> Self {
        BuildError::new(BuildErrorKind::Value(e))
    }
}

/// Policy and content update failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateErrorKind {
    #[error("can't update storage which has no tag")]
    UntaggedStorage,
    #[error("update tag {actual} doesn't match storage tag {expected}")]
    TagMismatch { expected: Uuid, actual: Uuid },
    #[error("can't modify hidden {0}")]
    HiddenModification(&'static str),
    #[error("can't append hidden {0}")]
    HiddenAppend(&'static str),
    #[error("path is empty")]
    EmptyPath,
    #[error("path is too short")]
    PathTooShort,
    #[error("path is too long, unexpected {0:?}")]
    PathTooLong(String),
    #[error("missing child {0:?}")]
    MissingChild(String),
    #[error("expected {0} as update entity")]
    InvalidEntity(&'static str),
    #[error("root id {actual:?} doesn't match {expected:?}")]
    InvalidRoot { expected: String, actual: String },
    #[error("missing content {0:?}")]
    MissingContent(String),
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
    #[error(transparent)]
    Build(#[from] BuildErrorKind),
}

impl ErrorKind for UpdateErrorKind {
    fn id(&self) -> u8 {
        match self {
            UpdateErrorKind::UntaggedStorage => 0x40,
            UpdateErrorKind::TagMismatch { .. } => 0x41,
            UpdateErrorKind::HiddenModification(_) => 0x42,
            UpdateErrorKind::HiddenAppend(_) => 0x43,
            UpdateErrorKind::EmptyPath => 0x44,
            UpdateErrorKind::PathTooShort => 0x45,
            UpdateErrorKind::PathTooLong(_) => 0x46,
            UpdateErrorKind::MissingChild(_) => 0x47,
            UpdateErrorKind::InvalidEntity(_) => 0x48,
            UpdateErrorKind::InvalidRoot { .. } => 0x49,
            UpdateErrorKind::MissingContent(_) => 0x4a,
            UpdateErrorKind::InvalidKey { .. } => 0x4b,
            UpdateErrorKind::Build(_) => 0x4c,
        }
    }
}

impl UpdateError {
    pub fn is_tag_mismatch(&self) -> bool {
        matches!(
            self.kind(),
            UpdateErrorKind::TagMismatch { .. } | UpdateErrorKind::UntaggedStorage
        )
    }
}

impl From<BuildError> for UpdateError {
    fn from(e: BuildError) -> Self {
        let mut out = UpdateError::new(UpdateErrorKind::Build(e.kind.clone()));
        out.path = e.path;
        out
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PdpError>;

/// Unified error type surfaced by the top-level API.
#[derive(Debug, Error)]
pub enum PdpError {
    #[error("invalid value: {0}")]
    Value(#[from] ValueError),
    #[error("invalid policy: {0}")]
    Build(#[from] BuildError),
    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),
    #[error("update rejected: {0}")]
    Update(#[from] UpdateError),
    #[error("bad config: {0}")]
    Config(String),
    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),
    #[error("internal: {0}")]
    Internal(String),
}

impl PdpError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PdpError::Value(_) => ErrorCode::InvalidValue,
            PdpError::Build(_) => ErrorCode::InvalidPolicy,
            PdpError::Eval(_) => ErrorCode::EvaluationFailed,
            PdpError::Update(e) if e.is_tag_mismatch() => ErrorCode::TagMismatch,
            PdpError::Update(_) => ErrorCode::UpdateRejected,
            PdpError::Config(_) => ErrorCode::BadConfig,
            PdpError::UnsupportedVersion(_) => ErrorCode::UnsupportedVersion,
            PdpError::Internal(_) => ErrorCode::Internal,
        }
    }
}
