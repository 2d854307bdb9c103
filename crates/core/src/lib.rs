pub mod admin;
pub mod config;
pub mod domain;
pub mod errors;
pub mod routing;
pub mod store;

pub use admin::{
    ContactDirectory, LeadWithContacts, OperatorAdmin, OperatorChanges, SourceAdmin, WeightAssignment,
};
pub use domain::contact::{Contact, ContactId, ContactStatus, NewContact};
pub use domain::lead::{Lead, LeadId, NewLead};
pub use domain::operator::{NewOperator, Operator, OperatorId, OperatorStatus};
pub use domain::source::{NewSource, OperatorSourceWeight, Source, SourceId};
pub use errors::{ApplicationError, DomainError, InterfaceError, StoreError};
pub use routing::{LeadDistributor, RandomSource, SeededRandom, WeightedSelector};
pub use store::{ContactStore, LeadStore, OperatorStore, SourceStore, Stores, WeightStore};
