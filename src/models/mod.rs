pub mod visitor;

pub use visitor::{Location, MatchTuple, UserIdQuery, UserIdResponse, VisitorRecord};
