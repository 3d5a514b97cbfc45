//! Directory records as read from the upstream API, and the document shape written out.
//!
//! The wire records ([`Group`], [`Principal`], [`GroupMembership`], [`DirectoryUser`]) mirror the
//! camelCase JSON of the directory and keep every optional field as `Option`. The rendered
//! records ([`GroupRecord`], [`PrincipalRecord`]) fix the key order and null rendering of the
//! published document, which consumers diff textually.

use serde::{Deserialize, Serialize};

/// Sentinel written for absent optional strings in the published document.
pub const NULL_SENTINEL: &str = "null";

/// A directory group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub group_types: Vec<String>,
    #[serde(default)]
    pub expiration_date_time: Option<String>,
}

/// A directory identity appearing as an owner or member of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
}

/// A group that another group is a member of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembership {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub group_types: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub creation_options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub business_phones: Vec<String>,
    #[serde(default)]
    pub mobile_phone: Option<String>,
}

/// One group with its owners and members, in the order the directory returned them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDocument {
    /// Identifier the group was addressed by. Always non-empty.
    pub id: String,
    pub group: Group,
    pub owners: Vec<Principal>,
    pub members: Vec<Principal>,
}

/// Every group document produced by one invocation, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentRoot {
    pub groups: Vec<GroupDocument>,
}

impl DocumentRoot {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Rendered records in document order.
    pub fn records(&self) -> Vec<GroupRecord> {
        self.groups.iter().map(GroupRecord::from).collect()
    }
}

/// Published form of a [`Principal`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalRecord {
    #[serde(rename = "memberId")]
    pub member_id: String,
    #[serde(rename = "memberName")]
    pub member_name: String,
    #[serde(rename = "memberMail")]
    pub member_mail: String,
}

impl From<&Principal> for PrincipalRecord {
    fn from(p: &Principal) -> Self {
        PrincipalRecord {
            member_id: or_sentinel(Some(p.id.as_str())),
            member_name: or_sentinel(p.display_name.as_deref()),
            member_mail: or_sentinel(p.mail.as_deref()),
        }
    }
}

/// Published form of a [`GroupDocument`].
///
/// Field declaration order is the serialized key order. Absent strings become `"null"`,
/// except `expirationDateTime`, which becomes a JSON `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "createdDateTime")]
    pub created_date_time: String,
    /// The group's own mail address.
    pub owner: String,
    pub owners: Vec<PrincipalRecord>,
    pub members: Vec<PrincipalRecord>,
    #[serde(rename = "groupTypes")]
    pub group_types: Vec<String>,
    #[serde(rename = "expirationDateTime")]
    pub expiration_date_time: Option<String>,
}

impl From<&GroupDocument> for GroupRecord {
    fn from(doc: &GroupDocument) -> Self {
        let g = &doc.group;
        GroupRecord {
            id: doc.id.clone(),
            display_name: or_sentinel(g.display_name.as_deref()),
            created_date_time: or_sentinel(g.created_date_time.as_deref()),
            owner: or_sentinel(g.mail.as_deref()),
            owners: doc.owners.iter().map(PrincipalRecord::from).collect(),
            members: doc.members.iter().map(PrincipalRecord::from).collect(),
            group_types: g.group_types.clone(),
            expiration_date_time: g.expiration_date_time.clone(),
        }
    }
}

fn or_sentinel(value: Option<&str>) -> String {
    value.unwrap_or(NULL_SENTINEL).to_string()
}

// The directory sends `"groupTypes": null` for some object types.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_deserializes_with_missing_and_null_fields() {
        let g: Group = serde_json::from_value(serde_json::json!({
            "id": "g1",
            "displayName": "Eng",
            "groupTypes": null,
            "mail": null
        }))
        .unwrap();
        assert_eq!(g.id.as_deref(), Some("g1"));
        assert_eq!(g.display_name.as_deref(), Some("Eng"));
        assert!(g.group_types.is_empty());
        assert!(g.mail.is_none());
        assert!(g.expiration_date_time.is_none());
    }

    #[test]
    fn record_renders_sentinels_and_json_null_expiration() {
        let doc = GroupDocument {
            id: "g1".into(),
            group: Group {
                id: Some("g1".into()),
                ..Default::default()
            },
            owners: vec![Principal {
                id: "u1".into(),
                display_name: None,
                mail: None,
            }],
            members: vec![],
        };
        let value = serde_json::to_value(GroupRecord::from(&doc)).unwrap();
        assert_eq!(value["displayName"], "null");
        assert_eq!(value["createdDateTime"], "null");
        assert_eq!(value["owner"], "null");
        assert_eq!(value["owners"][0]["memberName"], "null");
        assert_eq!(value["owners"][0]["memberMail"], "null");
        assert!(value["expirationDateTime"].is_null());
    }
}
