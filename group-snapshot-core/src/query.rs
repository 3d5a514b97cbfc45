//! Query options passed to every directory read.
//!
//! A [`DirectoryQuery`] carries the field projection, page size, derived-type cast and
//! consistency mode. Transport implementations translate it into query parameters and headers;
//! the assembler only decides *what* is asked for.

/// Read consistency requested from the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyLevel {
    #[default]
    Default,
    /// Accept index-backed results that may lag behind writes. Required for member and
    /// membership reads over large or nested groups.
    Eventual,
}

impl ConsistencyLevel {
    /// Value for the `ConsistencyLevel` request header, if one must be sent.
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            ConsistencyLevel::Default => None,
            ConsistencyLevel::Eventual => Some("eventual"),
        }
    }
}

/// Derived directory object type used to narrow a relationship read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    User,
}

impl ObjectType {
    /// Path segment that casts a directory-object collection to this type.
    pub fn cast_segment(&self) -> &'static str {
        match self {
            ObjectType::User => "microsoft.graph.user",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryQuery {
    pub select: Vec<&'static str>,
    pub top: Option<u32>,
    pub of_type: Option<ObjectType>,
    pub consistency: ConsistencyLevel,
}

pub const GROUP_PROPERTIES_FIELDS: &[&str] = &[
    "id",
    "displayName",
    "description",
    "createdDateTime",
    "mail",
    "groupTypes",
    "expirationDateTime",
];

pub const PRINCIPAL_FIELDS: &[&str] = &["id", "displayName", "mail"];

pub const GROUP_MEMBERSHIP_FIELDS: &[&str] = &[
    "id",
    "createdDateTime",
    "creationOptions",
    "description",
    "displayName",
    "groupTypes",
];

pub const USER_FIELDS: &[&str] = &[
    "id",
    "displayName",
    "jobTitle",
    "mail",
    "businessPhones",
    "mobilePhone",
];

impl DirectoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, fields: &[&'static str]) -> Self {
        self.select = fields.to_vec();
        self
    }

    pub fn top(mut self, top: Option<u32>) -> Self {
        self.top = top;
        self
    }

    pub fn of_type(mut self, object_type: ObjectType) -> Self {
        self.of_type = Some(object_type);
        self
    }

    pub fn consistency(mut self, level: ConsistencyLevel) -> Self {
        self.consistency = level;
        self
    }

    /// Full group objects, no projection.
    pub fn groups() -> Self {
        Self::new()
    }

    pub fn group_properties() -> Self {
        Self::new().select(GROUP_PROPERTIES_FIELDS)
    }

    pub fn owners() -> Self {
        Self::new().select(PRINCIPAL_FIELDS)
    }

    /// Members restricted to users, read in eventual-consistency mode.
    pub fn user_members() -> Self {
        Self::new()
            .select(PRINCIPAL_FIELDS)
            .of_type(ObjectType::User)
            .consistency(ConsistencyLevel::Eventual)
    }

    pub fn group_memberships() -> Self {
        Self::new()
            .select(GROUP_MEMBERSHIP_FIELDS)
            .consistency(ConsistencyLevel::Eventual)
    }

    pub fn users() -> Self {
        Self::new()
            .select(USER_FIELDS)
            .consistency(ConsistencyLevel::Eventual)
    }

    /// OData query parameters in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.select.is_empty() {
            pairs.push(("$select", self.select.join(",")));
        }
        if let Some(top) = self.top {
            pairs.push(("$top", top.to_string()));
        }
        pairs
    }
}
