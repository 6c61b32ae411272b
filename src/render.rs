//! Listing rendering.
//!
//! The HTML page is produced with `quick-xml`'s event writer so that every
//! key, name and URL is escaped on the way out.  The JSON document has the
//! shape `{"data": [{"name": ..., "urls": [{"url": ..., "size": ...}]}]}`.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;

use crate::listing::{Entry, Group};

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem auto;max-width:60rem;padding:0 1rem;color:#222}\
h1{font-size:1.6rem}h2{font-size:1.2rem;border-bottom:1px solid #ddd;padding-bottom:.25rem}\
ul{list-style:none;padding:0}li{display:flex;gap:1rem;padding:.2rem 0}\
li a{flex:1;overflow-wrap:anywhere}.size,time{color:#666;font-variant-numeric:tabular-nums}\
footer{margin-top:2rem;color:#888;font-size:.85rem}";

type XmlWriter = Writer<Vec<u8>>;

/// Render the grouped listing as a complete HTML page.
pub fn render_html(
    title: &str,
    groups: &[Group],
    created_at: DateTime<Utc>,
) -> Result<Vec<u8>, quick_xml::Error> {
    let mut writer = Writer::new(Vec::new());

    writer.write_event(Event::DocType(BytesText::from_escaped("html")))?;
    writer.write_event(Event::Start(
        BytesStart::new("html").with_attributes([("lang", "en")]),
    ))?;

    // <head>
    start(&mut writer, "head")?;
    writer.write_event(Event::Empty(
        BytesStart::new("meta").with_attributes([("charset", "utf-8")]),
    ))?;
    writer.write_event(Event::Empty(BytesStart::new("meta").with_attributes([
        ("name", "viewport"),
        ("content", "width=device-width, initial-scale=1"),
    ])))?;
    text_element(&mut writer, BytesStart::new("title"), title)?;
    start(&mut writer, "style")?;
    writer.write_event(Event::Text(BytesText::from_escaped(STYLE)))?;
    end(&mut writer, "style")?;
    end(&mut writer, "head")?;

    // <body>
    start(&mut writer, "body")?;
    text_element(&mut writer, BytesStart::new("h1"), title)?;

    if groups.is_empty() {
        text_element(&mut writer, BytesStart::new("p"), "No files.")?;
    }
    for group in groups {
        write_group(&mut writer, group)?;
    }

    text_element(
        &mut writer,
        BytesStart::new("footer"),
        &format!("Updated {} UTC", created_at.format("%Y-%m-%d %H:%M:%S")),
    )?;
    end(&mut writer, "body")?;
    end(&mut writer, "html")?;

    Ok(writer.into_inner())
}

fn write_group(writer: &mut XmlWriter, group: &Group) -> Result<(), quick_xml::Error> {
    start(writer, "section")?;
    text_element(writer, BytesStart::new("h2"), &group.name)?;
    start(writer, "ul")?;
    for entry in &group.entries {
        write_entry(writer, entry)?;
    }
    end(writer, "ul")?;
    end(writer, "section")
}

fn write_entry(writer: &mut XmlWriter, entry: &Entry) -> Result<(), quick_xml::Error> {
    start(writer, "li")?;
    text_element(
        writer,
        BytesStart::new("a").with_attributes([("href", entry.url.as_str())]),
        entry.short_name(),
    )?;
    text_element(
        writer,
        BytesStart::new("span").with_attributes([("class", "size")]),
        &entry.human_readable_size(),
    )?;
    let datetime = entry.last_modified.to_rfc3339();
    text_element(
        writer,
        BytesStart::new("time").with_attributes([("datetime", datetime.as_str())]),
        &entry.last_modified_display(),
    )?;
    end(writer, "li")
}

fn start(writer: &mut XmlWriter, tag: &str) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(tag)))
}

fn end(writer: &mut XmlWriter, tag: &str) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::End(BytesEnd::new(tag)))
}

/// Write `<tag ...>text</tag>` with `text` escaped.
fn text_element(
    writer: &mut XmlWriter,
    open: BytesStart<'_>,
    text: &str,
) -> Result<(), quick_xml::Error> {
    let name = String::from_utf8_lossy(open.name().as_ref()).into_owned();
    writer.write_event(Event::Start(open))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    data: &'a [Group],
}

/// Render the grouped listing as the JSON document.
pub fn render_json(groups: &[Group]) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&JsonDocument { data: groups })
}

// -- Tests -------------------------------------------------------------------
