//! Protobuf event payloads.
//!
//! Payloads carry stable identifiers (uuids, keys) and human-readable labels
//! only, never database ids. Timestamps are RFC 3339 strings; empty means unset.

#[derive(Clone, PartialEq, prost::Message)]
pub struct OrganizationRef {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub key: String,
    #[prost(string, tag = "3")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CourseChanged {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub key: String,
    #[prost(string, tag = "3")]
    pub title: String,
    #[prost(string, tag = "4")]
    pub partner: String,
    #[prost(string, tag = "5")]
    pub url_slug: String,
    #[prost(message, repeated, tag = "6")]
    pub authoring_organizations: Vec<OrganizationRef>,
    #[prost(string, tag = "7")]
    pub card_image_url: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CourseRunChanged {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub key: String,
    #[prost(string, tag = "3")]
    pub course_uuid: String,
    #[prost(string, tag = "4")]
    pub course_key: String,
    #[prost(string, tag = "5")]
    pub title: String,
    #[prost(string, tag = "6")]
    pub partner: String,
    #[prost(string, tag = "7")]
    pub start: String,
    #[prost(string, tag = "8")]
    pub end: String,
    #[prost(string, tag = "9")]
    pub pacing_type: String,
    #[prost(string, tag = "10")]
    pub status: String,
    #[prost(bool, tag = "11")]
    pub hidden: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OrganizationChanged {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub key: String,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub partner: String,
    #[prost(string, tag = "5")]
    pub logo_image_url: String,
}

/// A run of a program after its excluded runs have been removed.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProgramRun {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub key: String,
    #[prost(string, tag = "3")]
    pub course_uuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProgramChanged {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub title: String,
    #[prost(string, tag = "3")]
    pub status: String,
    #[prost(string, tag = "4")]
    pub program_type: String,
    #[prost(string, tag = "5")]
    pub partner: String,
    #[prost(string, tag = "6")]
    pub marketing_slug: String,
    #[prost(string, repeated, tag = "7")]
    pub course_uuids: Vec<String>,
    #[prost(message, repeated, tag = "8")]
    pub runs: Vec<ProgramRun>,
    #[prost(message, repeated, tag = "9")]
    pub authoring_organizations: Vec<OrganizationRef>,
}

/// Payload of every `*_delete` topic.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EntityDeleted {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub key: String,
    #[prost(string, tag = "3")]
    pub partner: String,
}
