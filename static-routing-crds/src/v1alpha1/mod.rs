pub mod condition;
pub mod ipruleset;
pub mod routingtable;
