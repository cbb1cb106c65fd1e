
use std::collections::HashMap;

use minidom::Element;
use serde::Deserialize;
use serde_json::Value;

use crate::jingle::ns;

/// Compact encoding of one source: `s`=ssrc, `n`=name, `m`=msid, `v` marks
/// a desktop video source.
#[derive(Debug, Deserialize)]
struct CompactSource {
    s: u32,
    n: Option<String>,
    m: Option<String>,
    v: Option<Value>,
}

/// `[semantics-shorthand, ssrc...]`; kept loose since the array mixes a
/// string with numbers.
type CompactGroup = Vec<Value>;

/// Per-endpoint quadruple: video sources, video groups, audio sources,
/// audio groups. Trailing arrays may be omitted on the wire.
#[derive(Debug, Deserialize)]
struct CompactEndpoint(
    #[serde(default)] Vec<CompactSource>,
    #[serde(default)] Vec<CompactGroup>,
    #[serde(default)] Vec<CompactSource>,
    #[serde(default)] Vec<CompactGroup>,
);

#[derive(Debug, Deserialize)]
struct CompactSourcesMessage {
    sources: serde_json::Map<String, Value>,
}

fn expand_semantics(shorthand: &str) -> Option<&'static str> {
    match shorthand {
        "f" => Some("FID"),
        "s" => Some("SIM"),
        _ => None,
    }
}

fn create_source_extension(owner: &str, source: &CompactSource, is_video: bool) -> Element {
    let video_type = if source.v.is_some() {
        Some("desktop")
    } else if is_video {
        Some("camera")
    } else {
        None
    };

    let mut element = Element::builder("source", ns::JINGLE_SSMA)
        .attr("ssrc", source.s.to_string())
        .attr("name", source.n.clone())
        .attr("videoType", video_type)
        .build();
    if let Some(msid) = &source.m {
        element.append_child(
            Element::builder("parameter", ns::JINGLE_SSMA)
                .attr("name", "msid")
                .attr("value", msid.as_str())
                .build(),
        );
    }
    element.append_child(
        Element::builder("ssrc-info", ns::JITSI_MEET)
            .attr("owner", owner)
            .build(),
    );
    element
}

fn create_ssrc_group_extension(group: &[Value]) -> Element {
    let semantics = group
        .first()
        .and_then(Value::as_str)
        .and_then(expand_semantics);
    let mut element = Element::builder("ssrc-group", ns::JINGLE_SSMA)
        .attr("semantics", semantics)
        .build();
    for value in group.iter().skip(1) {
        match value.as_u64() {
            Some(ssrc) => {
                element.append_child(
                    Element::builder("source", ns::JINGLE_SSMA)
                        .attr("ssrc", ssrc.to_string())
                        .build(),
                );
            }
            None => log::warn!("ignoring non-numeric ssrc in compact group: {value}"),
        }
    }
    element
}

/// Finds the rtp description for `media` under the jingle element,
/// creating the `content`/`description` pair when absent.
fn get_or_create_rtp_description<'a>(
    jingle: &'a mut Element,
    media: &str,
) -> Option<&'a mut Element> {
    let missing = !jingle
        .children()
        .any(|c| c.name() == "content" && c.attr("name") == Some(media));
    if missing {
        jingle.append_child(
            Element::builder("content", ns::JINGLE)
                .attr("name", media)
                .attr("creator", "responder")
                .build(),
        );
    }

    for content in jingle.children_mut() {
        if content.name() == "content" && content.attr("name") == Some(media) {
            if content.get_child("description", ns::JINGLE_RTP).is_none() {
                content.append_child(
                    Element::builder("description", ns::JINGLE_RTP)
                        .attr("media", media)
                        .build(),
                );
            }
            return content.get_child_mut("description", ns::JINGLE_RTP);
        }
    }
    None
}

/// Expands a compact-JSON `json-message` body into standard Jingle
/// `source`/`ssrc-group` elements appended under the stanza's `jingle`
/// child (or `stanza` itself when it is the jingle element).
///
/// Per owner, in order: video sources, video groups, audio sources, audio
/// groups. Video sources default to `videoType="camera"` unless marked as
/// desktop. Returns each owner's contributed SSRCs, video before audio.
///
/// A body that is not valid compact-source JSON is logged and yields
/// `None`, with the stanza left untouched.
pub fn expand_sources_from_json(
    stanza: &mut Element,
    json_message: &Element,
) -> Option<HashMap<String, Vec<u32>>> {
    let text = json_message.text();
    let message: CompactSourcesMessage = match serde_json::from_str(&text) {
        Ok(message) => message,
        Err(err) => {
            log::error!("json-message body is not valid compact sources JSON: {err}");
            return None;
        }
    };

    // Decode every endpoint before touching the stanza, so a malformed
    // entry cannot leave it half rewritten.
    let mut endpoints: Vec<(String, CompactEndpoint)> = vec![];
    for (owner, value) in message.sources {
        match serde_json::from_value(value) {
            Ok(endpoint) => endpoints.push((owner, endpoint)),
            Err(err) => {
                log::error!("malformed compact sources for '{owner}': {err}");
                return None;
            }
        }
    }

    let jingle: &mut Element = if stanza.name() == "jingle" {
        stanza
    } else {
        match stanza.get_child_mut("jingle", ns::JINGLE) {
            Some(jingle) => jingle,
            None => {
                log::warn!("stanza has no jingle child, nothing to expand into");
                return None;
            }
        }
    };

    let mut ssrc_map = HashMap::new();
    for (owner, endpoint) in endpoints {
        let CompactEndpoint(video_sources, video_groups, audio_sources, audio_groups) = endpoint;
        let mut ssrcs: Vec<u32> = vec![];

        if !video_sources.is_empty() || !video_groups.is_empty() {
            let description = get_or_create_rtp_description(jingle, "video")?;
            for source in &video_sources {
                description.append_child(create_source_extension(&owner, source, true));
                ssrcs.push(source.s);
            }
            for group in &video_groups {
                description.append_child(create_ssrc_group_extension(group));
            }
        }

        if !audio_sources.is_empty() || !audio_groups.is_empty() {
            let description = get_or_create_rtp_description(jingle, "audio")?;
            for source in &audio_sources {
                description.append_child(create_source_extension(&owner, source, false));
                ssrcs.push(source.s);
            }
            for group in &audio_groups {
                description.append_child(create_ssrc_group_extension(group));
            }
        }

        ssrc_map.insert(owner, ssrcs);
    }

    Some(ssrc_map)
}
