use std::sync::LazyLock;

use commonroom_core::error::{Error, Result};
use commonroom_core::ids::IdentifierKind;
use serde_json::{Map, Value, json};

/// Every tool the server exposes, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    TokenStatus,
    ActivityTypes,
    Segments,
    Segment,
    Tags,
    CustomFields,
    User,
    AddActivity,
    AddUser,
    DashboardUrls,
    MemberUrl,
    MemberActivityUrl,
    OrganizationUrl,
    SegmentUrl,
}

impl ToolName {
    pub const ALL: [ToolName; 14] = [
        ToolName::TokenStatus,
        ToolName::ActivityTypes,
        ToolName::Segments,
        ToolName::Segment,
        ToolName::Tags,
        ToolName::CustomFields,
        ToolName::User,
        ToolName::AddActivity,
        ToolName::AddUser,
        ToolName::DashboardUrls,
        ToolName::MemberUrl,
        ToolName::MemberActivityUrl,
        ToolName::OrganizationUrl,
        ToolName::SegmentUrl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::TokenStatus => "commonroom_get_token_status",
            ToolName::ActivityTypes => "commonroom_get_activity_types",
            ToolName::Segments => "commonroom_get_segments",
            ToolName::Segment => "commonroom_get_segment",
            ToolName::Tags => "commonroom_get_tags",
            ToolName::CustomFields => "commonroom_get_custom_fields",
            ToolName::User => "commonroom_get_user",
            ToolName::AddActivity => "commonroom_add_activity",
            ToolName::AddUser => "commonroom_add_user",
            ToolName::DashboardUrls => "commonroom_get_dashboard_urls",
            ToolName::MemberUrl => "commonroom_get_member_url",
            ToolName::MemberActivityUrl => "commonroom_get_member_activity_url",
            ToolName::OrganizationUrl => "commonroom_get_organization_url",
            ToolName::SegmentUrl => "commonroom_get_segment_url",
        }
    }

    pub fn parse(name: &str) -> Option<ToolName> {
        ToolName::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    fn description(self) -> &'static str {
        match self {
            ToolName::TokenStatus => "Check whether the configured Common Room API token is valid and which community it belongs to",
            ToolName::ActivityTypes => "Get all available Common Room activity types (article, webinar, presentation, etc.)",
            ToolName::Segments => "Get all Common Room audience segments for targeting and analysis",
            ToolName::Segment => "Get a single Common Room segment by ID",
            ToolName::Tags => "Get all Common Room tags used for categorizing activities and users",
            ToolName::CustomFields => "Get the custom member field definitions configured in Common Room",
            ToolName::User => "Get Common Room user profile and activity data by email address",
            ToolName::AddActivity => "Add a new activity record to Common Room (blog post, webinar, conference talk, etc.). Activity and user IDs are generated by the server.",
            ToolName::AddUser => "Add or update a user profile in Common Room. The user ID is generated by the server.",
            ToolName::DashboardUrls => "Get URLs for all Common Room dashboard sections (home, segments, search, contacts, etc.). Requires COMMONROOM_BASE_URL.",
            ToolName::MemberUrl => "Get URL for individual Common Room member page",
            ToolName::MemberActivityUrl => "Get URL for a Common Room member's activity page",
            ToolName::OrganizationUrl => "Get URL for individual Common Room organization page",
            ToolName::SegmentUrl => "Get URL for individual Common Room segment page",
        }
    }

    fn schema(self) -> ArgumentSchema {
        match self {
            ToolName::TokenStatus
            | ToolName::ActivityTypes
            | ToolName::Segments
            | ToolName::Tags
            | ToolName::CustomFields
            | ToolName::DashboardUrls => ArgumentSchema::closed(Vec::new()),
            ToolName::Segment => ArgumentSchema::closed(vec![
                FieldSpec::string("segment_id", "Segment ID to fetch").required(),
            ]),
            ToolName::User => ArgumentSchema::closed(vec![
                FieldSpec::string("email", "Email address of the user to look up").required(),
            ]),
            ToolName::AddActivity => ArgumentSchema::closed(vec![
                destination_source_field(),
                FieldSpec::object(
                    "activity",
                    "Activity data including activityType, user, activityTitle, content, url, timestamp",
                )
                .required()
                .with_schema(activity_schema()),
            ]),
            ToolName::AddUser => ArgumentSchema::closed(vec![
                destination_source_field(),
                FieldSpec::object(
                    "user",
                    "User data including email, fullName, companyName, titleAtCompany and social handles",
                )
                .required()
                .with_schema(user_upsert_schema()),
            ]),
            ToolName::MemberUrl => ArgumentSchema::closed(vec![
                FieldSpec::string("user_id", "User ID for the member page").required(),
                FieldSpec::boolean(
                    "show_activity",
                    "Link to the member's activity tab instead of the overview",
                )
                .default_value(json!(false)),
            ]),
            ToolName::MemberActivityUrl => ArgumentSchema::closed(vec![
                FieldSpec::string("user_id", "User ID for the member activity page").required(),
            ]),
            ToolName::OrganizationUrl => ArgumentSchema::closed(vec![
                FieldSpec::string("org_id", "Organization ID for the organization page").required(),
            ]),
            ToolName::SegmentUrl => ArgumentSchema::closed(vec![
                FieldSpec::string("segment_id", "Segment ID for the segment page").required(),
            ]),
        }
    }

    fn descriptor(self) -> ToolDescriptor {
        ToolDescriptor {
            name: self,
            description: self.description(),
            schema: self.schema(),
        }
    }
}

fn destination_source_field() -> FieldSpec {
    FieldSpec::string(
        "destination_source_id",
        "Common Room destination source ID the record is written under",
    )
    .required()
}

fn activity_schema() -> ArgumentSchema {
    ArgumentSchema::open(vec![
        FieldSpec::string("id", "Unique activity ID").generated(IdentifierKind::Activity),
        FieldSpec::string("activityType", "Type of activity (article, webinar, etc.)").required(),
        FieldSpec::object("user", "User who performed the activity")
            .required()
            .with_schema(activity_user_schema()),
        FieldSpec::object("activityTitle", "Activity title, e.g. {\"type\": \"text\", \"value\": \"...\"}"),
        FieldSpec::object("content", "Activity content/description"),
        FieldSpec::string("url", "URL to the activity"),
        FieldSpec::string("timestamp", "ISO 8601 timestamp"),
    ])
}

fn activity_user_schema() -> ArgumentSchema {
    ArgumentSchema::open(vec![
        FieldSpec::string("id", "Unique user ID").generated(IdentifierKind::User),
        FieldSpec::string("email", "User email address"),
        FieldSpec::string("fullName", "User's full name"),
        FieldSpec::string("companyName", "User's company"),
        FieldSpec::string("titleAtCompany", "User's job title"),
    ])
}

fn user_upsert_schema() -> ArgumentSchema {
    ArgumentSchema::open(vec![
        FieldSpec::string("id", "Unique user ID").generated(IdentifierKind::User),
        FieldSpec::string("email", "User email address"),
        FieldSpec::string("fullName", "User's full name"),
        FieldSpec::string("companyName", "User's company"),
        FieldSpec::string("titleAtCompany", "User's job title"),
        FieldSpec::string("twitter", "Twitter/X handle"),
        FieldSpec::string("github", "GitHub username"),
        FieldSpec::string("linkedin", "LinkedIn profile handle or URL"),
        FieldSpec::string("discord", "Discord username"),
        FieldSpec::string("youtube", "YouTube channel handle"),
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Boolean,
    Object,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Boolean => "boolean",
            FieldKind::Object => "object",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<Value>,
    /// Always replaced with a fresh identifier of this kind.
    pub generated: Option<IdentifierKind>,
    /// Declared shape for object fields.
    pub nested: Option<ArgumentSchema>,
}

impl FieldSpec {
    fn new(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
            default: None,
            generated: None,
            nested: None,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::String, description)
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::Boolean, description)
    }

    pub fn object(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldKind::Object, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn generated(mut self, kind: IdentifierKind) -> Self {
        self.generated = Some(kind);
        self
    }

    pub fn with_schema(mut self, schema: ArgumentSchema) -> Self {
        self.nested = Some(schema);
        self
    }

    /// Callers must supply this field: required, not defaulted, not generated.
    pub fn caller_required(&self) -> bool {
        self.required && self.default.is_none() && self.generated.is_none()
    }

    fn to_json_schema(&self) -> Value {
        let mut property = match &self.nested {
            Some(schema) => schema.to_json_schema(),
            None => json!({ "type": self.kind.as_str() }),
        };
        let description = if self.generated.is_some() {
            format!(
                "{} (server-generated; any supplied value is replaced)",
                self.description
            )
        } else {
            self.description.to_string()
        };
        property["description"] = Value::String(description);
        if let Some(default) = &self.default {
            property["default"] = default.clone();
        }
        property
    }
}

/// Input contract for a tool (or a nested object argument).
#[derive(Debug, Clone)]
pub struct ArgumentSchema {
    pub fields: Vec<FieldSpec>,
    /// Open schemas accept fields beyond the declared ones.
    pub open: bool,
}

impl ArgumentSchema {
    pub fn closed(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            open: false,
        }
    }

    pub fn open(fields: Vec<FieldSpec>) -> Self {
        Self { fields, open: true }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(field.name.to_string(), field.to_json_schema());
        }
        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": self.open,
        });
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.caller_required())
            .map(|field| field.name)
            .collect();
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: ToolName,
    pub description: &'static str,
    pub schema: ArgumentSchema,
}

impl ToolDescriptor {
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name.as_str(),
            "description": self.description,
            "inputSchema": self.schema.to_json_schema(),
        })
    }
}

static CATALOG: LazyLock<Vec<ToolDescriptor>> =
    LazyLock::new(|| ToolName::ALL.into_iter().map(ToolName::descriptor).collect());

/// The advertised tool catalog, in display order.
pub fn catalog() -> &'static [ToolDescriptor] {
    &CATALOG
}

pub fn lookup(name: &str) -> Result<&'static ToolDescriptor> {
    let tool = ToolName::parse(name).ok_or_else(|| Error::UnknownTool(name.to_string()))?;
    catalog()
        .iter()
        .find(|descriptor| descriptor.name == tool)
        .ok_or_else(|| Error::UnknownTool(name.to_string()))
}
