//! XML dialect for distribution messages
//!
//! ```text
//! <distributionMessage messageId=".." timestamp=".." serverId=".." encodingFormat="XML" messageType="DISTRIBUTION">
//!   <variables>
//!     <variable name="temperature"><value>21.50</value><unit>C</unit></variable>
//!   </variables>
//! </distributionMessage>
//! ```
//!
//! Decoding is strict: this is the only validation layer for broadcasts.

use super::CodecError;
use crate::models::{DistributionMessage, EncodingFormat, MessageType, Variable};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

const ROOT: &str = "distributionMessage";
const VARIABLES: &str = "variables";
const VARIABLE: &str = "variable";
const VALUE: &str = "value";
const UNIT: &str = "unit";

fn encode_err(e: impl ToString) -> CodecError {
    CodecError::Encode(e.to_string())
}

fn parse_err(msg: impl Into<String>) -> CodecError {
    CodecError::Parse(msg.into())
}

pub(super) fn encode(msg: &DistributionMessage) -> Result<String, CodecError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let timestamp = msg.timestamp.to_string();

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(encode_err)?;

    let root = BytesStart::new(ROOT).with_attributes([
        ("messageId", msg.message_id.as_str()),
        ("timestamp", timestamp.as_str()),
        ("serverId", msg.server_id.as_str()),
        ("encodingFormat", EncodingFormat::Xml.tag()),
        ("messageType", MessageType::Distribution.as_str()),
    ]);
    writer.write_event(Event::Start(root)).map_err(encode_err)?;
    writer
        .write_event(Event::Start(BytesStart::new(VARIABLES)))
        .map_err(encode_err)?;

    for var in &msg.variables {
        let value = format!("{:.2}", var.value);
        writer
            .write_event(Event::Start(BytesStart::new(VARIABLE).with_attributes([("name", var.name.as_str())])))
            .map_err(encode_err)?;
        write_text_element(&mut writer, VALUE, &value)?;
        write_text_element(&mut writer, UNIT, &var.unit)?;
        writer
            .write_event(Event::End(BytesEnd::new(VARIABLE)))
            .map_err(encode_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(VARIABLES)))
        .map_err(encode_err)?;
    writer.write_event(Event::End(BytesEnd::new(ROOT))).map_err(encode_err)?;

    String::from_utf8(writer.into_inner()).map_err(encode_err)
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), CodecError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(encode_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(encode_err)?;
    writer.write_event(Event::End(BytesEnd::new(name))).map_err(encode_err)
}

pub(super) fn decode(payload: &str) -> Result<DistributionMessage, CodecError> {
    let root = parse_tree(payload)?;
    into_message(root)
}

/// Minimal element tree, enough to validate the distribution schema.
#[derive(Debug)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn open(start: &BytesStart<'_>) -> Result<Self, CodecError> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| parse_err(format!("invalid element name: {e}")))?
            .to_string();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| parse_err(format!("invalid attribute on <{name}>: {e}")))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| parse_err(format!("invalid attribute name on <{name}>: {e}")))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| parse_err(format!("invalid attribute value on <{name}>: {e}")))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn required_attr(&self, key: &str) -> Result<&str, CodecError> {
        self.attr(key)
            .ok_or_else(|| parse_err(format!("<{}> is missing attribute '{key}'", self.name)))
    }

    fn expect_no_text(&self) -> Result<(), CodecError> {
        if self.text.trim().is_empty() {
            Ok(())
        } else {
            Err(parse_err(format!("unexpected text inside <{}>", self.name)))
        }
    }

    /// Text of the single `<name>` child, rejecting missing or repeated ones.
    fn single_text_child(&self, name: &str) -> Result<&str, CodecError> {
        let mut matches = self.children.iter().filter(|c| c.name == name);
        let child = matches
            .next()
            .ok_or_else(|| parse_err(format!("<{}> is missing <{name}>", self.name)))?;
        if matches.next().is_some() {
            return Err(parse_err(format!("<{}> has more than one <{name}>", self.name)));
        }
        if !child.children.is_empty() {
            return Err(parse_err(format!("<{name}> must only contain text")));
        }
        Ok(child.text.trim())
    }
}

fn parse_tree(payload: &str) -> Result<Node, CodecError> {
    let mut reader = Reader::from_str(payload);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| parse_err(format!("malformed XML at byte {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(start) => stack.push(Node::open(&start)?),
            Event::Empty(start) => {
                let node = Node::open(&start)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| parse_err("closing tag without matching opening tag"))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| parse_err(format!("invalid text content: {e}")))?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| parse_err(format!("invalid CDATA content: {e}")))?;
                push_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            // declaration, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(parse_err(format!("unexpected end of document inside <{}>", open.name)));
    }
    root.ok_or_else(|| parse_err("document has no root element"))
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<(), CodecError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None if root.is_some() => Err(parse_err("document has more than one root element")),
        None => {
            *root = Some(node);
            Ok(())
        }
    }
}

fn push_text(stack: &mut [Node], text: &str) -> Result<(), CodecError> {
    match stack.last_mut() {
        Some(node) => {
            node.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(parse_err("text outside of the root element")),
    }
}

fn into_message(root: Node) -> Result<DistributionMessage, CodecError> {
    if root.name != ROOT {
        return Err(parse_err(format!("unexpected root element <{}>", root.name)));
    }
    root.expect_no_text()?;

    let message_id = root.required_attr("messageId")?.to_string();
    let timestamp = root
        .required_attr("timestamp")?
        .trim()
        .parse::<i64>()
        .map_err(|e| parse_err(format!("invalid timestamp: {e}")))?;
    let server_id = root.required_attr("serverId")?.to_string();
    let encoding = root.required_attr("encodingFormat")?;
    if EncodingFormat::from_tag(encoding) != Some(EncodingFormat::Xml) {
        return Err(parse_err(format!("encodingFormat '{encoding}' does not match XML envelope")));
    }
    if let Some(message_type) = root.attr("messageType") {
        if message_type != MessageType::Distribution.as_str() {
            return Err(parse_err(format!("unexpected message type {message_type}")));
        }
    }

    let container = match root.children.as_slice() {
        [only] if only.name == VARIABLES => only,
        _ => return Err(parse_err(format!("<{ROOT}> must contain exactly one <{VARIABLES}>"))),
    };
    container.expect_no_text()?;

    let mut variables = Vec::with_capacity(container.children.len());
    for node in &container.children {
        variables.push(into_variable(node)?);
    }

    Ok(DistributionMessage {
        message_id,
        timestamp,
        server_id,
        encoding_format: EncodingFormat::Xml,
        message_type: MessageType::Distribution,
        variables,
    })
}

fn into_variable(node: &Node) -> Result<Variable, CodecError> {
    if node.name != VARIABLE {
        return Err(parse_err(format!("unexpected <{}> inside <{VARIABLES}>", node.name)));
    }
    node.expect_no_text()?;
    let name = node.required_attr("name")?;
    if let Some(other) = node.children.iter().find(|c| c.name != VALUE && c.name != UNIT) {
        return Err(parse_err(format!("unexpected <{}> inside variable '{name}'", other.name)));
    }

    let raw_value = node.single_text_child(VALUE)?;
    let value = raw_value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| parse_err(format!("non-numeric value '{raw_value}' for variable '{name}'")))?;
    let unit = node.single_text_child(UNIT)?;

    Ok(Variable::new(name, value, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(variables: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<distributionMessage messageId="m-1" timestamp="1700000000000" serverId="S2" encodingFormat="XML" messageType="DISTRIBUTION">
  <variables>{variables}</variables>
</distributionMessage>"#
        )
    }

    #[test]
    fn test_decodes_hand_written_document() {
        let msg = decode(&document(
            r#"<variable name="temperature"><value> 18.25 </value><unit>C</unit></variable>
               <variable name="wind"><unit>km/h</unit><value>7</value></variable>"#,
        ))
        .unwrap();
        assert_eq!(msg.server_id, "S2");
        assert_eq!(msg.timestamp, 1_700_000_000_000);
        assert_eq!(msg.variables[0], Variable::new("temperature", 18.25, "C"));
        assert_eq!(msg.variables[1], Variable::new("wind", 7.0, "km/h"));
    }

    #[test]
    fn test_escaped_unit_survives() {
        let msg = DistributionMessage::new("S<1>", EncodingFormat::Xml, vec![Variable::new("a&b", 1.0, "<m>")]);
        let decoded = decode(&encode(&msg).unwrap()).unwrap();
        assert_eq!(decoded.server_id, "S<1>");
        assert_eq!(decoded.variables[0].unit, "<m>");
    }

    #[test]
    fn test_empty_unit_is_allowed() {
        let msg = decode(&document(r#"<variable name="index"><value>3</value><unit/></variable>"#)).unwrap();
        assert_eq!(msg.variables[0].unit, "");
    }

    #[test]
    fn test_rejects_missing_value_or_unit() {
        let missing_unit = document(r#"<variable name="t"><value>1</value></variable>"#);
        let missing_value = document(r#"<variable name="t"><unit>C</unit></variable>"#);
        for doc in [missing_unit, missing_value] {
            assert!(matches!(decode(&doc), Err(CodecError::Parse(_))));
        }
    }

    #[test]
    fn test_rejects_duplicate_children() {
        let doc = document(r#"<variable name="t"><value>1</value><value>2</value><unit>C</unit></variable>"#);
        let err = decode(&doc).unwrap_err();
        assert!(err.to_string().contains("more than one <value>"), "{err}");
    }

    #[test]
    fn test_rejects_non_numeric_value() {
        for value in ["abc", "12,5", "NaN", ""] {
            let doc = document(&format!(r#"<variable name="t"><value>{value}</value><unit>C</unit></variable>"#));
            assert!(matches!(decode(&doc), Err(CodecError::Parse(_))), "{value} accepted");
        }
    }

    #[test]
    fn test_rejects_missing_root_attribute() {
        let doc = r#"<distributionMessage messageId="m" timestamp="1" encodingFormat="XML" messageType="DISTRIBUTION"><variables/></distributionMessage>"#;
        let err = decode(doc).unwrap_err();
        assert!(err.to_string().contains("serverId"), "{err}");
    }

    #[test]
    fn test_message_type_attribute_is_optional() {
        let doc = r#"<distributionMessage messageId="m" timestamp="1" serverId="S1" encodingFormat="XML"><variables/></distributionMessage>"#;
        let msg = decode(doc).unwrap();
        assert_eq!(msg.message_type, MessageType::Distribution);
        assert!(msg.variables.is_empty());

        let wrong = doc.replace("encodingFormat=\"XML\"", "encodingFormat=\"XML\" messageType=\"CONTROL\"");
        assert!(decode(&wrong).is_err());
    }

    #[test]
    fn test_rejects_wrong_root_and_unknown_elements() {
        assert!(decode("<reading/>").is_err());
        let doc = document(r#"<variable name="t"><value>1</value><unit>C</unit><note>x</note></variable>"#);
        assert!(decode(&doc).is_err());
        let doc = document(r#"<sensor name="t"><value>1</value><unit>C</unit></sensor>"#);
        assert!(decode(&doc).is_err());
    }

    #[test]
    fn test_rejects_mismatched_tags_and_garbage() {
        assert!(decode("<distributionMessage><variables></distributionMessage>").is_err());
        assert!(decode("not xml").is_err());
        assert!(decode("").is_err());
    }
}
