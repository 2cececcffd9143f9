//! JSON input shapes: filter conditions (flat and nested), aggregation
//! stages and saved queries.

pub mod filter;
pub mod query;
pub mod stage;

pub use filter::{
    Condition, DataType, FilterExpr, FilterInput, FlatFilter, Logic, Operator, OperatorCategory,
};
pub use query::{
    IndexSpec, MongoQuery, Operation, QueryOptions, Update, UpdateKind, UpdateOperation,
    WriteConcern,
};
pub use stage::{PipelineStage, StageType};
