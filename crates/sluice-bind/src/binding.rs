//! Binding descriptors and the field-enrichment engine
//!
//! A [`Binding`] is built once per request type, before serving. It records how the value
//! is first produced (decoded from the JSON body or defaulted) and an ordered list of field
//! setters, each tied to a [`Source`] and a parsed [`Tag`]. Per request, [`Binding::populate`]
//! runs the setters source by source in a fixed order.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    error::{ConfigError, EnrichError},
    field::FieldValue,
    tag::Tag,
};

/// Where a bound value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Body,
    Header,
    Cookie,
    Context,
    Query,
}

impl Source {
    /// Order of the per-field passes; the body is always decoded before any of them
    pub const ENRICH_ORDER: [Source; 4] =
        [Source::Header, Source::Cookie, Source::Context, Source::Query];

    pub fn name(&self) -> &'static str {
        match self {
            Source::Body => "body",
            Source::Header => "header",
            Source::Cookie => "cookie",
            Source::Context => "context",
            Source::Query => "query",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which sources a request type reads from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sources {
    pub body: bool,
    pub header: bool,
    pub cookie: bool,
    pub context: bool,
    pub query: bool,
}

impl Sources {
    pub fn contains(&self, source: Source) -> bool {
        match source {
            Source::Body => self.body,
            Source::Header => self.header,
            Source::Cookie => self.cookie,
            Source::Context => self.context,
            Source::Query => self.query,
        }
    }

    fn insert(&mut self, source: Source) {
        match source {
            Source::Body => self.body = true,
            Source::Header => self.header = true,
            Source::Cookie => self.cookie = true,
            Source::Context => self.context = true,
            Source::Query => self.query = true,
        }
    }
}

/// Key lookup across transport sources
///
/// `None` means "not found"; how absence is detected is up to the transport (an empty header
/// counts as absent, an empty query value does not).
pub trait SourceLookup {
    fn lookup(&mut self, source: Source, key: &str) -> Option<Value>;
}

/// Request types with a binding, usually via `#[derive(Bind)]`
pub trait Bind: Sized + Send + 'static {
    fn binding() -> Result<Binding<Self>, ConfigError>;
}

type Setter<T> = Box<dyn Fn(&mut T, Value, &Tag) -> Result<(), EnrichError> + Send + Sync>;

struct FieldBinding<T> {
    source: Source,
    tag: Tag,
    setter: Setter<T>,
}

/// How a fresh request value is produced before field enrichment
pub(crate) enum Seed<T> {
    Default(fn() -> T),
    Body(fn(&[u8]) -> serde_json::Result<T>),
}

pub struct Binding<T> {
    seed: Seed<T>,
    fields: Vec<FieldBinding<T>>,
    sources: Sources,
}

impl<T: Default + 'static> Binding<T> {
    /// Start from `T::default()`; the body is not read
    pub fn new() -> Self {
        Self::with_seed(Seed::Default(T::default), Sources::default())
    }
}

impl<T: Default + 'static> Default for Binding<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + 'static> Binding<T> {
    /// Start from the JSON body (or JSON-RPC params) decoded as `T`
    pub fn from_body() -> Self {
        let sources = Sources {
            body: true,
            ..Sources::default()
        };
        Self::with_seed(Seed::Body(decode_json::<T>), sources)
    }
}

fn decode_json<T: DeserializeOwned>(data: &[u8]) -> serde_json::Result<T> {
    serde_json::from_slice(data)
}

impl<T: 'static> Binding<T> {
    fn with_seed(seed: Seed<T>, sources: Sources) -> Self {
        Self {
            seed,
            fields: Vec::new(),
            sources,
        }
    }

    pub fn header<F>(self, tag: &str, field: fn(&mut T) -> &mut F) -> Result<Self, ConfigError>
    where
        F: FieldValue + 'static,
    {
        self.bind(Source::Header, tag, field)
    }

    pub fn cookie<F>(self, tag: &str, field: fn(&mut T) -> &mut F) -> Result<Self, ConfigError>
    where
        F: FieldValue + 'static,
    {
        self.bind(Source::Cookie, tag, field)
    }

    pub fn context<F>(self, tag: &str, field: fn(&mut T) -> &mut F) -> Result<Self, ConfigError>
    where
        F: FieldValue + 'static,
    {
        self.bind(Source::Context, tag, field)
    }

    pub fn query<F>(self, tag: &str, field: fn(&mut T) -> &mut F) -> Result<Self, ConfigError>
    where
        F: FieldValue + 'static,
    {
        self.bind(Source::Query, tag, field)
    }

    fn bind<F>(
        mut self,
        source: Source,
        tag: &str,
        field: fn(&mut T) -> &mut F,
    ) -> Result<Self, ConfigError>
    where
        F: FieldValue + 'static,
    {
        let tag = Tag::parse(tag)?;
        self.fields.push(FieldBinding {
            source,
            tag,
            setter: Box::new(move |target, value, tag| field(target).assign(value, tag)),
        });
        self.sources.insert(source);
        Ok(self)
    }
}

impl<T> Binding<T> {
    pub fn sources(&self) -> Sources {
        self.sources
    }

    pub(crate) fn seed(&self) -> &Seed<T> {
        &self.seed
    }

    /// Tags bound to `source`, in declaration order
    pub fn tags(&self, source: Source) -> impl Iterator<Item = &Tag> {
        self.fields
            .iter()
            .filter(move |field| field.source == source)
            .map(|field| &field.tag)
    }

    /// Populate every field bound to `source` from `provider`
    ///
    /// Fails on the first bad field; fields set before it keep their new values. Returns the
    /// number of fields bound to `source`.
    pub fn enrich<P>(
        &self,
        target: &mut T,
        source: Source,
        mut provider: P,
    ) -> Result<usize, EnrichError>
    where
        P: FnMut(&str) -> Option<Value>,
    {
        let mut found = 0;
        for field in self.fields.iter().filter(|field| field.source == source) {
            found += 1;
            match provider(&field.tag.key) {
                Some(value) => (field.setter)(target, value, &field.tag)?,
                None if field.tag.modifier.requires_value() => {
                    return Err(EnrichError::Missing(field.tag.key.clone()));
                }
                None => {}
            }
        }
        Ok(found)
    }

    /// Run the header, cookie, context and query passes in that order
    ///
    /// Sources the type does not read are never asked; the first failure stops every later
    /// pass.
    pub fn populate<L>(&self, target: &mut T, lookup: &mut L) -> Result<(), EnrichError>
    where
        L: SourceLookup + ?Sized,
    {
        for source in Source::ENRICH_ORDER {
            if self.sources.contains(source) {
                self.enrich(target, source, |key| lookup.lookup(source, key))?;
            }
        }
        Ok(())
    }
}

impl<T> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|field| format!("{}:{}", field.source, field.tag))
            .collect();
        f.debug_struct("Binding")
            .field("sources", &self.sources)
            .field("fields", &fields)
            .finish()
    }
}
