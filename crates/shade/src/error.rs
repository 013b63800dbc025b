use crate::field::FieldType;

/// Errors raised while building, compiling or binding an expression graph.
///
/// All of these are construction-time errors: once a program is bound to a
/// uniform snapshot, evaluating a fragment cannot fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("type mismatch in {op}: expected {expected}, got {actual:?}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        actual: FieldType,
    },
    #[error("uniform `{name}` declared as {first:?} and {second:?}")]
    UniformTypeConflict {
        name: String,
        first: FieldType,
        second: FieldType,
    },
    #[error("no value bound for uniform `{0}`")]
    MissingUniform(String),
    #[error("uniform `{name}` expects {expected:?}, got {actual:?}")]
    UniformValueType {
        name: String,
        expected: FieldType,
        actual: FieldType,
    },
    #[error("cyclic dependency through node `{node}`")]
    Cycle { node: String },
    #[error("node `{referenced}` referenced by `{by}` does not exist")]
    UnknownNode { referenced: String, by: String },
    #[error("node id `{0}` is defined more than once")]
    DuplicateNode(String),
    #[error("graph description error: {0}")]
    Description(String),
}
