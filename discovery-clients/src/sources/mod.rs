//! One reader per upstream source.

pub mod commerce;
pub mod courses;
pub mod marketing;
pub mod organizations;

pub use commerce::{
    AttributeValue, CommerceApiClient, CommerceCourseRecord, CommerceSource, EntitlementRecord,
    ProductRecord, StockRecord,
};
pub use courses::{CourseRunRecord, CoursesApiClient, CoursesSource};
pub use marketing::{
    LanguageRecord, LevelTypeRecord, MarketingApiClient, MarketingCourseRecord, MarketingSource,
    PersonRecord, PositionRecord, PrerequisiteRecord, ProgramPublication, ProgramRecord,
    SocialNetworkRecord, SubjectRecord,
};
pub use organizations::{OrganizationRecord, OrganizationsApiClient, OrganizationsSource};

/// Source tags stored on the rows each source writes.
pub const COURSES_API: &str = "courses_api";
pub const ECOMMERCE_API: &str = "ecommerce_api";
pub const MARKETING_SITE: &str = "marketing_site";
pub const ORGANIZATIONS_API: &str = "organizations_api";
