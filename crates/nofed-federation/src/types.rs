//! ActivityPub wire types.
//!
//! Only the fields the bridge reads or writes are modelled. Deserialisation is
//! lenient where real servers disagree: `to`/`cc` may be a single string or a
//! list, `attributedTo` and `actor` may be a URL or an embedded object, and
//! `icon` may be a bare URL, an `Image` or a list of images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const AS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";
pub const SECURITY_CONTEXT: &str = "https://w3id.org/security/v1";
/// The public addressing collection.
pub const PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";
pub const ACTIVITY_JSON: &str = "application/activity+json";

/// `@context` for documents served by the bridge.
pub fn default_context() -> Value {
    serde_json::json!([AS_CONTEXT, SECURITY_CONTEXT])
}

// ─── Actors ──────────────────────────────────────────────────────────────────

/// A federation actor (`Person`, `Service`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub id: String,
    #[serde(rename = "type", default = "person")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_image", skip_serializing_if = "Option::is_none")]
    pub icon: Option<Image>,
    #[serde(default)]
    pub inbox: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbox: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
}

fn person() -> String {
    "Person".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    pub id: String,
    pub owner: String,
    pub public_key_pem: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(rename = "type", default = "image")]
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

fn image() -> String {
    "Image".into()
}

impl Image {
    pub fn new(url: impl Into<String>) -> Self {
        Self { kind: image(), url: url.into(), media_type: None }
    }
}

// ─── Notes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub id: String,
    #[serde(rename = "type", default = "note")]
    pub kind: String,
    #[serde(deserialize_with = "reference_id")]
    pub attributed_to: String,
    /// HTML.
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_reference_id", skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub to: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub cc: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn note() -> String {
    "Note".into()
}

// ─── Activities ──────────────────────────────────────────────────────────────

/// An activity wrapping an object of type `T`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity<T> {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "reference_id_or_empty")]
    pub actor: String,
    pub object: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
}

impl Activity<Note> {
    /// Wrap `note` in a `Create` addressed like the note itself.
    pub fn create(id: impl Into<String>, note: Note) -> Self {
        Activity {
            context: None,
            id: id.into(),
            kind: "Create".into(),
            actor: note.attributed_to.clone(),
            published: note.published,
            to: note.to.clone(),
            cc: note.cc.clone(),
            object: note,
        }
    }
}

// ─── Collections ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollection<T> {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub total_items: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<CollectionFirst<T>>,
    /// Some servers inline the items on the collection itself.
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub ordered_items: Vec<T>,
}

/// `first` is either the URL of the first page or the page itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CollectionFirst<T> {
    Link(String),
    Page(OrderedCollectionPage<T>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollectionPage<T> {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "page")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of: Option<String>,
    #[serde(default)]
    pub total_items: usize,
    #[serde(default = "Vec::new", alias = "items")]
    pub ordered_items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

fn page() -> String {
    "OrderedCollectionPage".into()
}

impl<T> OrderedCollectionPage<T> {
    pub fn new(id: impl Into<String>, part_of: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            id: id.into(),
            kind: page(),
            part_of: Some(part_of.into()),
            total_items: items.len(),
            ordered_items: items,
            next: None,
        }
    }
}

impl<T> OrderedCollection<T> {
    /// A collection with `first_page` embedded.
    pub fn with_first_page(id: impl Into<String>, first_page: OrderedCollectionPage<T>) -> Self {
        Self {
            context: Some(Value::String(AS_CONTEXT.into())),
            id: id.into(),
            kind: "OrderedCollection".into(),
            total_items: first_page.total_items,
            first: Some(CollectionFirst::Page(first_page)),
            ordered_items: Vec::new(),
        }
    }
}

// ─── WebFinger ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebfingerResponse {
    pub subject: String,
    #[serde(default)]
    pub links: Vec<WebfingerLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebfingerLink {
    pub rel: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl WebfingerResponse {
    /// The `self` link pointing at an ActivityPub actor document.
    pub fn actor_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| {
                l.rel == "self"
                    && l.kind.as_deref().is_some_and(|t| t == ACTIVITY_JSON || t.starts_with("application/ld+json"))
            })
            .and_then(|l| l.href.as_deref())
    }
}

// ─── Lenient field decoding ──────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum Reference {
    Id(String),
    Object { id: String },
    Many(Vec<Reference>),
}

impl Reference {
    fn into_id(self) -> Option<String> {
        match self {
            Reference::Id(id) | Reference::Object { id } => Some(id),
            Reference::Many(refs) => refs.into_iter().find_map(Reference::into_id),
        }
    }
}

fn reference_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Reference::deserialize(d)?
        .into_id()
        .ok_or_else(|| serde::de::Error::custom("empty reference list"))
}

fn reference_id_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(optional_reference_id(d)?.unwrap_or_default())
}

fn optional_reference_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Reference>::deserialize(d)?.and_then(Reference::into_id))
}

fn one_or_many<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(d)? {
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}

fn lenient_image<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Image>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ImageRef {
        Url(String),
        Image(Image),
        Many(Vec<Image>),
    }

    Ok(match Option::<ImageRef>::deserialize(d)? {
        Some(ImageRef::Url(url)) => Some(Image::new(url)),
        Some(ImageRef::Image(img)) => Some(img),
        Some(ImageRef::Many(imgs)) => imgs.into_iter().next(),
        None => None,
    })
}
