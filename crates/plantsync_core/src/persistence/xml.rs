//! `model.xml` document codec.
//!
//! # Responsibility
//! - Serialize a visual model as ordered component records, each with a
//!   kind tag, a name and a typed key/value property set.
//! - Parse such documents back, or only far enough to read the model name.
//!
//! # Invariants
//! - Output is UTF-8, indented, and keeps record order.
//! - Names, set and list items and map entries round-trip exactly.
//! - All data lives in attributes; text nodes are ignored on read.

use crate::model::component::VisualComponent;
use crate::model::course::CourseModel;
use crate::model::property::{Color, Length, LengthUnit, PropertySet, PropertyValue};
use crate::model::reference::EntityKind;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MODEL_TAG: &str = "model";
const COMPONENT_TAG: &str = "component";
const PROPERTY_TAG: &str = "property";
const ITEM_TAG: &str = "item";
const ENTRY_TAG: &str = "entry";
const FORMAT_VERSION: &str = "1";

pub type XmlResult<T> = Result<T, XmlError>;

/// Model document read/write error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// Input is not well-formed XML.
    Syntax(String),
    /// Input is XML but not a model document.
    Structure(String),
    /// Serializer failure.
    Write(String),
}

impl Display for XmlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax(message) => write!(f, "malformed xml: {message}"),
            Self::Structure(message) => write!(f, "invalid model document: {message}"),
            Self::Write(message) => write!(f, "cannot write model document: {message}"),
        }
    }
}

impl Error for XmlError {}

/// One persisted component.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRecord {
    pub kind: EntityKind,
    pub name: String,
    pub properties: PropertySet,
}

impl ElementRecord {
    pub fn from_component(component: &VisualComponent) -> Self {
        Self {
            kind: component.kind,
            name: component.name.clone(),
            properties: component.properties.clone(),
        }
    }

    /// Fresh component with a new id; derived state is left empty.
    pub fn into_component(self) -> VisualComponent {
        let mut component = VisualComponent::new(self.kind, self.name);
        component.properties = self.properties;
        component
    }
}

/// Serialized form of one visual model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseDocument {
    pub name: String,
    pub records: Vec<ElementRecord>,
}

impl CourseDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
        }
    }

    /// Records of `model` in persist order.
    pub fn from_model(model: &CourseModel, name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: model
                .in_persist_order()
                .into_iter()
                .map(ElementRecord::from_component)
                .collect(),
        }
    }

    pub fn push(&mut self, record: ElementRecord) {
        self.records.push(record);
    }

    /// Replaces the content of `into` with this document.
    pub fn into_model(self, into: &mut CourseModel) {
        into.clear();
        into.set_name(self.name);
        for record in self.records {
            into.add(record.into_component());
        }
    }
}

/// Renders `document` as an indented UTF-8 XML string.
pub fn write_document(document: &CourseDocument) -> XmlResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_event(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut root = BytesStart::new(MODEL_TAG);
    root.push_attribute(("name", document.name.as_str()));
    root.push_attribute(("version", FORMAT_VERSION));
    write_event(&mut writer, Event::Start(root))?;

    for record in &document.records {
        let mut element = BytesStart::new(COMPONENT_TAG);
        element.push_attribute(("kind", record.kind.as_str()));
        element.push_attribute(("name", record.name.as_str()));
        if record.properties.is_empty() {
            write_event(&mut writer, Event::Empty(element))?;
            continue;
        }
        write_event(&mut writer, Event::Start(element))?;
        for (key, value) in record.properties.iter() {
            write_property(&mut writer, key, value)?;
        }
        write_event(&mut writer, Event::End(BytesEnd::new(COMPONENT_TAG)))?;
    }

    write_event(&mut writer, Event::End(BytesEnd::new(MODEL_TAG)))?;
    String::from_utf8(writer.into_inner()).map_err(|err| XmlError::Write(err.to_string()))
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> XmlResult<()> {
    writer
        .write_event(event)
        .map_err(|err| XmlError::Write(err.to_string()))
}

fn write_property(
    writer: &mut Writer<Vec<u8>>,
    key: &str,
    value: &PropertyValue,
) -> XmlResult<()> {
    let mut element = BytesStart::new(PROPERTY_TAG);
    element.push_attribute(("key", key));
    element.push_attribute(("type", value.type_label()));

    match value {
        PropertyValue::Text(text) => element.push_attribute(("value", text.as_str())),
        PropertyValue::Integer(number) => {
            element.push_attribute(("value", number.to_string().as_str()));
        }
        PropertyValue::Flag(flag) => {
            element.push_attribute(("value", if *flag { "true" } else { "false" }));
        }
        PropertyValue::Length(length) => {
            element.push_attribute(("value", length.value.to_string().as_str()));
            element.push_attribute(("unit", length.unit.as_str()));
        }
        PropertyValue::Color(color) => element.push_attribute(("value", color.to_hex().as_str())),
        PropertyValue::Set(items) | PropertyValue::List(items) => {
            if items.is_empty() {
                return write_event(writer, Event::Empty(element));
            }
            write_event(writer, Event::Start(element))?;
            for item in items {
                let mut child = BytesStart::new(ITEM_TAG);
                child.push_attribute(("value", item.as_str()));
                write_event(writer, Event::Empty(child))?;
            }
            return write_event(writer, Event::End(BytesEnd::new(PROPERTY_TAG)));
        }
        PropertyValue::Map(entries) => {
            if entries.is_empty() {
                return write_event(writer, Event::Empty(element));
            }
            write_event(writer, Event::Start(element))?;
            for (entry_key, entry_value) in entries {
                let mut child = BytesStart::new(ENTRY_TAG);
                child.push_attribute(("key", entry_key.as_str()));
                child.push_attribute(("value", entry_value.as_str()));
                write_event(writer, Event::Empty(child))?;
            }
            return write_event(writer, Event::End(BytesEnd::new(PROPERTY_TAG)));
        }
    }
    write_event(writer, Event::Empty(element))
}

/// Parses a full model document.
pub fn read_document(input: &str) -> XmlResult<CourseDocument> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);
    let mut parser = DocumentParser::default();

    loop {
        match reader.read_event().map_err(syntax)? {
            Event::Start(element) => parser.open(&element, false)?,
            Event::Empty(element) => parser.open(&element, true)?,
            Event::End(element) => parser.close(element.name().as_ref())?,
            Event::Eof => break,
            _ => {}
        }
    }
    parser.finish()
}

/// Reads only the root element's `name` attribute.
pub fn read_model_name(input: &str) -> XmlResult<String> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event().map_err(syntax)? {
            Event::Start(element) | Event::Empty(element) => {
                let tag = element.name();
                if tag.as_ref() != MODEL_TAG.as_bytes() {
                    return Err(unexpected_element(tag.as_ref()));
                }
                let mut attributes = attributes_of(&element)?;
                return take_required(&mut attributes, "name", MODEL_TAG);
            }
            Event::Eof => {
                return Err(XmlError::Structure(format!(
                    "missing <{MODEL_TAG}> root element"
                )))
            }
            _ => {}
        }
    }
}

enum PendingCollection {
    Set {
        key: String,
        items: Vec<String>,
    },
    List {
        key: String,
        items: Vec<String>,
    },
    Map {
        key: String,
        entries: BTreeMap<String, String>,
    },
}

#[derive(Default)]
struct DocumentParser {
    document: Option<CourseDocument>,
    record: Option<ElementRecord>,
    collection: Option<PendingCollection>,
    closed: bool,
}

impl DocumentParser {
    fn open(&mut self, element: &BytesStart<'_>, empty: bool) -> XmlResult<()> {
        let tag = element.name();
        let mut attributes = attributes_of(element)?;

        match tag.as_ref() {
            b"model" => {
                if self.document.is_some() || self.closed {
                    return Err(XmlError::Structure("duplicate <model> element".into()));
                }
                let name = take_required(&mut attributes, "name", MODEL_TAG)?;
                self.document = Some(CourseDocument::new(name));
                self.closed = empty;
            }
            b"component" => {
                if self.document.is_none() || self.closed || self.record.is_some() {
                    return Err(misplaced(COMPONENT_TAG));
                }
                let raw_kind = take_required(&mut attributes, "kind", COMPONENT_TAG)?;
                let kind = EntityKind::parse(&raw_kind).ok_or_else(|| {
                    XmlError::Structure(format!("unknown component kind `{raw_kind}`"))
                })?;
                let record = ElementRecord {
                    kind,
                    name: take_required(&mut attributes, "name", COMPONENT_TAG)?,
                    properties: PropertySet::new(),
                };
                if empty {
                    self.push_record(record)?;
                } else {
                    self.record = Some(record);
                }
            }
            b"property" => {
                if self.record.is_none() || self.collection.is_some() {
                    return Err(misplaced(PROPERTY_TAG));
                }
                let key = take_required(&mut attributes, "key", PROPERTY_TAG)?;
                let type_label = take_required(&mut attributes, "type", PROPERTY_TAG)?;
                let collection = match type_label.as_str() {
                    "set" => PendingCollection::Set {
                        key,
                        items: Vec::new(),
                    },
                    "list" => PendingCollection::List {
                        key,
                        items: Vec::new(),
                    },
                    "map" => PendingCollection::Map {
                        key,
                        entries: BTreeMap::new(),
                    },
                    _ => {
                        let value = parse_scalar(&key, &type_label, &mut attributes)?;
                        self.set_property(key, value)?;
                        return Ok(());
                    }
                };
                if empty {
                    self.finish_collection(collection)?;
                } else {
                    self.collection = Some(collection);
                }
            }
            b"item" => {
                let value = take_required(&mut attributes, "value", ITEM_TAG)?;
                match &mut self.collection {
                    Some(
                        PendingCollection::Set { items, .. } | PendingCollection::List { items, .. },
                    ) => items.push(value),
                    _ => return Err(misplaced(ITEM_TAG)),
                }
            }
            b"entry" => {
                let key = take_required(&mut attributes, "key", ENTRY_TAG)?;
                let value = take_required(&mut attributes, "value", ENTRY_TAG)?;
                match &mut self.collection {
                    Some(PendingCollection::Map { entries, .. }) => {
                        entries.insert(key, value);
                    }
                    _ => return Err(misplaced(ENTRY_TAG)),
                }
            }
            other => return Err(unexpected_element(other)),
        }
        Ok(())
    }

    fn close(&mut self, tag: &[u8]) -> XmlResult<()> {
        match tag {
            b"property" => {
                if let Some(collection) = self.collection.take() {
                    self.finish_collection(collection)?;
                }
            }
            b"component" => {
                if let Some(record) = self.record.take() {
                    self.push_record(record)?;
                }
            }
            b"model" => self.closed = true,
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> XmlResult<CourseDocument> {
        match self.document {
            Some(document) if self.closed => Ok(document),
            Some(_) => Err(XmlError::Structure("unexpected end of document".into())),
            None => Err(XmlError::Structure(format!(
                "missing <{MODEL_TAG}> root element"
            ))),
        }
    }

    fn push_record(&mut self, record: ElementRecord) -> XmlResult<()> {
        match &mut self.document {
            Some(document) => {
                document.push(record);
                Ok(())
            }
            None => Err(misplaced(COMPONENT_TAG)),
        }
    }

    fn set_property(&mut self, key: String, value: PropertyValue) -> XmlResult<()> {
        match &mut self.record {
            Some(record) => {
                record.properties.set(key, value);
                Ok(())
            }
            None => Err(misplaced(PROPERTY_TAG)),
        }
    }

    fn finish_collection(&mut self, collection: PendingCollection) -> XmlResult<()> {
        match collection {
            PendingCollection::Set { key, items } => {
                self.set_property(key, PropertyValue::Set(items))
            }
            PendingCollection::List { key, items } => {
                self.set_property(key, PropertyValue::List(items))
            }
            PendingCollection::Map { key, entries } => {
                self.set_property(key, PropertyValue::Map(entries))
            }
        }
    }
}

fn parse_scalar(
    key: &str,
    type_label: &str,
    attributes: &mut BTreeMap<String, String>,
) -> XmlResult<PropertyValue> {
    let value = take_required(attributes, "value", PROPERTY_TAG)?;
    let invalid = || {
        XmlError::Structure(format!(
            "property `{key}` has invalid {type_label} value `{value}`"
        ))
    };

    match type_label {
        "text" => Ok(PropertyValue::Text(value.clone())),
        "integer" => value
            .trim()
            .parse::<i64>()
            .map(PropertyValue::Integer)
            .map_err(|_| invalid()),
        "flag" => match value.trim() {
            "true" => Ok(PropertyValue::Flag(true)),
            "false" => Ok(PropertyValue::Flag(false)),
            _ => Err(invalid()),
        },
        "length" => {
            let unit = take_required(attributes, "unit", PROPERTY_TAG)?;
            let unit = LengthUnit::parse(&unit).ok_or_else(invalid)?;
            let amount = value.trim().parse::<f64>().map_err(|_| invalid())?;
            Ok(PropertyValue::Length(Length::new(amount, unit)))
        }
        "color" => Color::parse_hex(&value)
            .map(PropertyValue::Color)
            .ok_or_else(invalid),
        other => Err(XmlError::Structure(format!(
            "property `{key}` has unknown type `{other}`"
        ))),
    }
}

fn attributes_of(element: &BytesStart<'_>) -> XmlResult<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();
    for attribute in element.attributes() {
        let attribute = attribute.map_err(syntax)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(syntax)?.into_owned();
        values.insert(key, value);
    }
    Ok(values)
}

fn take_required(
    attributes: &mut BTreeMap<String, String>,
    name: &str,
    tag: &str,
) -> XmlResult<String> {
    attributes
        .remove(name)
        .ok_or_else(|| XmlError::Structure(format!("<{tag}> is missing attribute `{name}`")))
}

fn syntax<E: Display>(err: E) -> XmlError {
    XmlError::Syntax(err.to_string())
}

fn misplaced(tag: &str) -> XmlError {
    XmlError::Structure(format!("<{tag}> is not allowed here"))
}

fn unexpected_element(tag: &[u8]) -> XmlError {
    XmlError::Structure(format!(
        "unexpected element <{}>",
        String::from_utf8_lossy(tag)
    ))
}
