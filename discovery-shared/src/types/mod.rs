//! Catalog entity types.

pub mod catalog;
pub mod course;
pub mod entity;
pub mod exchange_rate;
pub mod history;
pub mod kind;
pub mod organization;
pub mod partner;
pub mod person;
pub mod program;
pub mod vocabulary;

pub use catalog::Catalog;
pub use course::{
    Course, CourseEntitlement, CourseRun, OfacRestriction, PacingType, RunStatus, Seat,
    TranslationLanguage,
};
pub use entity::{CatalogEntity, Draftable, Scope};
pub use exchange_rate::ExchangeRate;
pub use history::{ChangeContext, HistoryRecord, HistoryType, REFRESH_CHANGE_REASON};
pub use kind::EntityKind;
pub use organization::Organization;
pub use partner::Partner;
pub use person::{Person, Position, SocialNetwork};
pub use program::{Program, ProgramStatus, ProgramType};
pub use vocabulary::{
    CourseRunType, CourseType, Currency, LanguageTag, LevelType, Mode, Prerequisite, SeatType,
    SkillValidationConfiguration, Subject, Track, EMPTY_TYPE_SLUG,
};
