//! SOAP envelope construction and response parsing for EWS
//!
//! Requests are built with format strings (the envelopes are small and
//! fixed-shape); responses are walked with quick-xml's event reader so we
//! never depend on prefix spelling, only on local element names.

use anyhow::Result;
use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{EwsResponseError, FolderInfo, ItemSummary};
use crate::models::OrderingField;

const SOAP_PRELUDE: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
<soap:Body>"#;

const SOAP_EPILOGUE: &str = r#"</soap:Body>
</soap:Envelope>"#;

const MESSAGES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/messages";

/// The EWS FieldURI that orders and filters a folder
pub(crate) fn field_uri(field: OrderingField) -> &'static str {
    match field {
        OrderingField::Received => "item:DateTimeReceived",
        OrderingField::Sent => "item:DateTimeSent",
    }
}

/// Build a FindItem request: id-only shape plus the headers the engine
/// needs, optional strictly-greater-than restriction, ascending sort, and
/// an indexed page view.
pub(crate) fn find_item_request(
    mailbox: &str,
    folder_id: &str,
    field: OrderingField,
    newer_than: Option<DateTime<Utc>>,
    offset: usize,
    page_size: usize,
) -> String {
    let uri = field_uri(field);

    let restriction = match newer_than {
        Some(threshold) => format!(
            r#"
    <Restriction>
      <t:IsGreaterThan>
        <t:FieldURI FieldURI="{uri}"/>
        <t:FieldURIOrConstant>
          <t:Constant Value="{}"/>
        </t:FieldURIOrConstant>
      </t:IsGreaterThan>
    </Restriction>"#,
            threshold.format("%Y-%m-%dT%H:%M:%SZ")
        ),
        None => String::new(),
    };

    format!(
        r#"{SOAP_PRELUDE}
  <FindItem xmlns="{MESSAGES_NS}" Traversal="Shallow">
    <ItemShape>
      <t:BaseShape>IdOnly</t:BaseShape>
      <t:AdditionalProperties>
        <t:FieldURI FieldURI="message:InternetMessageId"/>
        <t:FieldURI FieldURI="item:Subject"/>
        <t:FieldURI FieldURI="message:From"/>
        <t:FieldURI FieldURI="item:DateTimeReceived"/>
        <t:FieldURI FieldURI="item:DateTimeSent"/>
      </t:AdditionalProperties>
    </ItemShape>
    <IndexedPageItemView MaxEntriesReturned="{page_size}" Offset="{offset}" BasePoint="Beginning"/>{restriction}
    <SortOrder>
      <t:FieldOrder Order="Ascending">
        <t:FieldURI FieldURI="{uri}"/>
      </t:FieldOrder>
    </SortOrder>
    <ParentFolderIds>
      <t:DistinguishedFolderId Id="{folder_id}">
        <t:Mailbox><t:EmailAddress>{}</t:EmailAddress></t:Mailbox>
      </t:DistinguishedFolderId>
    </ParentFolderIds>
  </FindItem>
{SOAP_EPILOGUE}"#,
        escape(mailbox)
    )
}

/// Build a batched GetItem request asking for raw MIME content
pub(crate) fn get_item_request(item_ids: &[String]) -> String {
    let ids = item_ids
        .iter()
        .map(|id| format!(r#"      <t:ItemId Id="{}"/>"#, escape(id)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"{SOAP_PRELUDE}
  <GetItem xmlns="{MESSAGES_NS}">
    <ItemShape>
      <t:BaseShape>IdOnly</t:BaseShape>
      <t:IncludeMimeContent>true</t:IncludeMimeContent>
    </ItemShape>
    <ItemIds>
{ids}
    </ItemIds>
  </GetItem>
{SOAP_EPILOGUE}"#
    )
}

/// Build a shallow FindFolder request under the message folder root
pub(crate) fn find_folder_request(mailbox: &str) -> String {
    format!(
        r#"{SOAP_PRELUDE}
  <FindFolder xmlns="{MESSAGES_NS}" Traversal="Shallow">
    <FolderShape><t:BaseShape>Default</t:BaseShape></FolderShape>
    <ParentFolderIds>
      <t:DistinguishedFolderId Id="msgfolderroot">
        <t:Mailbox><t:EmailAddress>{}</t:EmailAddress></t:Mailbox>
      </t:DistinguishedFolderId>
    </ParentFolderIds>
  </FindFolder>
{SOAP_EPILOGUE}"#,
        escape(mailbox)
    )
}

/// One page of FindItem results
#[derive(Debug, Default)]
pub(crate) struct FindItemPage {
    pub items: Vec<ItemSummary>,
    pub includes_last: bool,
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().local_name().as_ref()).to_string()
}

fn attribute(e: &BytesStart, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.to_string())
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Surface an EWS-level failure as a typed error.
///
/// A response can be HTTP 200 and still carry
/// `ResponseClass="Error"` on its response message; the transport layer
/// never sees that.
fn check_response_error(xml: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut failed = false;
    let mut code = String::new();
    let mut message = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = local_name(&e);
                if local.ends_with("ResponseMessage") {
                    failed = attribute(&e, "ResponseClass").as_deref() == Some("Error");
                } else if failed && local == "ResponseCode" {
                    code = reader.read_text(e.name())?.to_string();
                } else if failed && local == "MessageText" {
                    message = reader.read_text(e.name())?.to_string();
                }
            }
            Ok(Event::Empty(e)) => {
                let local = local_name(&e);
                if local.ends_with("ResponseMessage") {
                    failed = attribute(&e, "ResponseClass").as_deref() == Some("Error");
                }
            }
            Ok(Event::End(e)) => {
                let local = String::from_utf8_lossy(e.name().local_name().as_ref()).to_string();
                if failed && local.ends_with("ResponseMessage") {
                    return Err(EwsResponseError { code, message }.into());
                }
            }
            Ok(Event::Eof) => {
                if failed {
                    return Err(EwsResponseError { code, message }.into());
                }
                break;
            }
            Err(e) => anyhow::bail!("Malformed EWS response: {}", e),
            _ => {}
        }
    }

    Ok(())
}

pub(crate) fn parse_find_item_response(xml: &str) -> Result<FindItemPage> {
    check_response_error(xml)?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = FindItemPage::default();
    let mut current: Option<ItemSummary> = None;
    let mut in_from = false;
    let mut sender_name: Option<String> = None;
    let mut sender_email: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = local_name(&e);
                match local.as_str() {
                    "RootFolder" => {
                        page.includes_last =
                            attribute(&e, "IncludesLastItemInRange").as_deref() == Some("true");
                    }
                    "Message" => {
                        current = Some(ItemSummary::default());
                        in_from = false;
                        sender_name = None;
                        sender_email = None;
                    }
                    "From" => in_from = true,
                    "Name" if in_from => {
                        sender_name = Some(reader.read_text(e.name())?.to_string());
                    }
                    "EmailAddress" if in_from => {
                        sender_email = Some(reader.read_text(e.name())?.to_string());
                    }
                    "InternetMessageId" => {
                        let text = reader.read_text(e.name())?.to_string();
                        if let Some(item) = current.as_mut() {
                            item.message_id = Some(text);
                        }
                    }
                    "Subject" => {
                        let text = reader.read_text(e.name())?.to_string();
                        if let Some(item) = current.as_mut() {
                            item.subject = text;
                        }
                    }
                    "DateTimeReceived" => {
                        let text = reader.read_text(e.name())?;
                        if let Some(item) = current.as_mut() {
                            item.received_at = parse_datetime(&text);
                        }
                    }
                    "DateTimeSent" => {
                        let text = reader.read_text(e.name())?;
                        if let Some(item) = current.as_mut() {
                            item.sent_at = parse_datetime(&text);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let local = local_name(&e);
                if local == "RootFolder" {
                    page.includes_last =
                        attribute(&e, "IncludesLastItemInRange").as_deref() == Some("true");
                } else if local == "ItemId"
                    && let Some(item) = current.as_mut()
                    && let Some(id) = attribute(&e, "Id")
                {
                    item.item_id = id;
                }
            }
            Ok(Event::End(e)) => {
                let local = String::from_utf8_lossy(e.name().local_name().as_ref()).to_string();
                match local.as_str() {
                    "From" => {
                        in_from = false;
                        if let Some(item) = current.as_mut() {
                            item.sender = match (sender_name.take(), sender_email.take()) {
                                (Some(name), Some(email)) => Some(format!("{} <{}>", name, email)),
                                (None, Some(email)) => Some(email),
                                (Some(name), None) => Some(name),
                                (None, None) => None,
                            };
                        }
                    }
                    "Message" => {
                        if let Some(item) = current.take()
                            && !item.item_id.is_empty()
                        {
                            page.items.push(item);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("Malformed FindItem response: {}", e),
            _ => {}
        }
    }

    Ok(page)
}

/// Parse a GetItem response into (item id, base64 MIME content) pairs
pub(crate) fn parse_get_item_response(xml: &str) -> Result<Vec<(String, String)>> {
    check_response_error(xml)?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut item_id: Option<String> = None;
    let mut mime: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = local_name(&e);
                match local.as_str() {
                    "Message" => {
                        item_id = None;
                        mime = None;
                    }
                    "MimeContent" => {
                        mime = Some(reader.read_text(e.name())?.to_string());
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if local_name(&e) == "ItemId" {
                    item_id = attribute(&e, "Id");
                }
            }
            Ok(Event::End(e)) => {
                let local = String::from_utf8_lossy(e.name().local_name().as_ref()).to_string();
                if local == "Message"
                    && let (Some(id), Some(content)) = (item_id.take(), mime.take())
                {
                    out.push((id, content));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("Malformed GetItem response: {}", e),
            _ => {}
        }
    }

    Ok(out)
}

/// Parse a FindFolder response into folder metadata
pub(crate) fn parse_find_folder_response(xml: &str) -> Result<Vec<FolderInfo>> {
    check_response_error(xml)?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut folders = Vec::new();
    let mut current: Option<FolderInfo> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = local_name(&e);
                match local.as_str() {
                    "Folder" | "CalendarFolder" | "ContactsFolder" | "SearchFolder"
                    | "TasksFolder" => {
                        current = Some(FolderInfo {
                            display_name: String::new(),
                            total_count: None,
                            unread_count: None,
                        });
                    }
                    "DisplayName" => {
                        let text = reader.read_text(e.name())?.to_string();
                        if let Some(folder) = current.as_mut() {
                            folder.display_name = text;
                        }
                    }
                    "TotalCount" => {
                        let text = reader.read_text(e.name())?;
                        if let Some(folder) = current.as_mut() {
                            folder.total_count = text.parse().ok();
                        }
                    }
                    "UnreadCount" => {
                        let text = reader.read_text(e.name())?;
                        if let Some(folder) = current.as_mut() {
                            folder.unread_count = text.parse().ok();
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let local = String::from_utf8_lossy(e.name().local_name().as_ref()).to_string();
                if matches!(
                    local.as_str(),
                    "Folder" | "CalendarFolder" | "ContactsFolder" | "SearchFolder" | "TasksFolder"
                ) && let Some(folder) = current.take()
                    && !folder.display_name.is_empty()
                {
                    folders.push(folder);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("Malformed FindFolder response: {}", e),
            _ => {}
        }
    }

    Ok(folders)
}
