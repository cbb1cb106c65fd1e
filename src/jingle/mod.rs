
use std::time::{SystemTime, UNIX_EPOCH};

use minidom::Element;

use crate::description::media::{Direction, MediaSourceInfo, MediaType};
use crate::description::session::SessionDescription;
use crate::error::{Error, Result};
use crate::util;
use crate::util::{END_LINE, MLine};

/// XMPP namespaces of the Jingle content model (XEP-0166 family).
pub mod ns {
    pub const JINGLE: &str = "urn:xmpp:jingle:1";
    pub const JINGLE_RTP: &str = "urn:xmpp:jingle:apps:rtp:1";
    pub const JINGLE_RTP_RTCP_FB: &str = "urn:xmpp:jingle:apps:rtp:rtcp-fb:0";
    pub const JINGLE_RTP_HDREXT: &str = "urn:xmpp:jingle:apps:rtp:rtp-hdrext:0";
    pub const JINGLE_SSMA: &str = "urn:xmpp:jingle:apps:rtp:ssma:0";
    pub const JINGLE_GROUPING: &str = "urn:xmpp:jingle:apps:grouping:0";
    pub const JINGLE_ICE_UDP: &str = "urn:xmpp:jingle:transports:ice-udp:1";
    pub const JINGLE_DTLS: &str = "urn:xmpp:jingle:apps:dtls:0";
    pub const JINGLE_DTLS_SCTP: &str = "urn:xmpp:jingle:transports:dtls-sctp:1";
    pub const JITSI_MEET: &str = "http://jitsi.org/jitmeet";
}

impl SessionDescription {
    /// Appends this description's content tree to a `jingle` element.
    ///
    /// One `content` per media section, in section order, preceded by one
    /// `group` element per session-level `a=group:` line. `creator` goes
    /// on every content element verbatim.
    pub fn to_jingle(&self, jingle: &mut Element, creator: &str) {
        for line in util::find_lines(&self.session, "a=group:") {
            let rest = &line["a=group:".len()..];
            let mut parts = rest.split_whitespace();
            let Some(semantics) = parts.next() else {
                continue;
            };
            let mids: Vec<&str> = parts.collect();
            if mids.is_empty() {
                continue;
            }
            let mut group = Element::builder("group", ns::JINGLE_GROUPING)
                .attr("semantics", semantics)
                .build();
            for mid in mids {
                group.append_child(
                    Element::builder("content", ns::JINGLE_GROUPING)
                        .attr("name", mid)
                        .build(),
                );
            }
            jingle.append_child(group);
        }

        let ssrc_map = self.get_media_ssrc_map();

        for (i, media) in self.media.iter().enumerate() {
            let (first, _) = media.split_once(END_LINE).unwrap_or((media.as_str(), ""));
            let Some(mline) = util::parse_mline(first) else {
                continue;
            };
            let Some(media_type) = MediaType::new(&mline.media) else {
                continue;
            };

            let name = self.mid(i).unwrap_or_else(|| mline.media.clone());
            let mut content = Element::builder("content", ns::JINGLE)
                .attr("creator", creator)
                .attr("name", name)
                .build();

            if matches!(media_type, MediaType::Audio | MediaType::Video) {
                let description =
                    self.description_to_jingle(media, &mline, ssrc_map.get(&i));
                content.append_child(description);
            }

            self.transport_to_jingle(media, &mut content);

            if let Some(direction) = self.media_direction(i) {
                content.set_attr("senders", direction.as_senders());
            }
            if self.is_rejected(i) {
                content.set_attr("senders", "rejected");
            }

            jingle.append_child(content);
        }
    }

    fn description_to_jingle(
        &self,
        media: &str,
        mline: &MLine,
        info: Option<&MediaSourceInfo>,
    ) -> Element {
        let session = Some(self.session.as_str());

        let ssrc = util::find_line(media, "a=ssrc:")
            .and_then(|line| line["a=ssrc:".len()..].split_whitespace().next())
            .map(str::to_owned);
        let mut description = Element::builder("description", ns::JINGLE_RTP)
            .attr("media", mline.media.as_str())
            .attr("ssrc", ssrc)
            .build();

        for fmt in &mline.formats {
            let Some(rtpmap) =
                util::find_line(media, &format!("a=rtpmap:{fmt} ")).and_then(util::parse_rtpmap)
            else {
                continue;
            };
            let mut payload_type = Element::builder("payload-type", ns::JINGLE_RTP)
                .attr("id", rtpmap.id.as_str())
                .attr("name", rtpmap.name.as_str())
                .attr("clockrate", rtpmap.clockrate.as_str())
                .attr("channels", rtpmap.channels.as_str())
                .build();
            if let Some(parameters) =
                util::find_line(media, &format!("a=fmtp:{fmt} ")).and_then(util::parse_fmtp)
            {
                for parameter in parameters {
                    payload_type.append_child(
                        Element::builder("parameter", ns::JINGLE_RTP)
                            .attr("name", parameter.name.as_str())
                            .attr("value", parameter.value)
                            .build(),
                    );
                }
            }
            rtcp_fb_to_jingle(media, &mut payload_type, fmt);
            description.append_child(payload_type);
        }

        let crypto_lines = util::find_lines_in(media, "a=crypto:", session);
        if !crypto_lines.is_empty() {
            let mut encryption = Element::builder("encryption", ns::JINGLE_RTP)
                .attr("required", "1")
                .build();
            for line in crypto_lines {
                if let Some(crypto) = util::parse_crypto(line) {
                    encryption.append_child(
                        Element::builder("crypto", ns::JINGLE_RTP)
                            .attr("tag", crypto.tag)
                            .attr("crypto-suite", crypto.crypto_suite)
                            .attr("key-params", crypto.key_params)
                            .attr("session-params", crypto.session_params)
                            .build(),
                    );
                }
            }
            description.append_child(encryption);
        }

        if let Some(info) = info {
            for ssrc in info.ordered_ssrcs() {
                let Some(source_info) = info.sources.iter().find(|s| s.ssrc == ssrc) else {
                    continue;
                };
                let mut source = Element::builder("source", ns::JINGLE_SSMA)
                    .attr("ssrc", ssrc.to_string())
                    .build();
                if self.source_name_signaling {
                    if let Some(name) = source_info.source_name() {
                        source.set_attr("name", name);
                    }
                    if let Some(video_type) = source_info.video_type() {
                        source.set_attr("videoType", video_type);
                    }
                }
                for line in &source_info.lines {
                    let Some(idx) = line.find(' ') else {
                        continue;
                    };
                    let kv = &line[idx + 1..];
                    let parameter = match kv.split_once(':') {
                        Some((name, value)) => Element::builder("parameter", ns::JINGLE_SSMA)
                            .attr("name", name)
                            .attr("value", value)
                            .build(),
                        None => Element::builder("parameter", ns::JINGLE_SSMA)
                            .attr("name", kv)
                            .build(),
                    };
                    source.append_child(parameter);
                }
                description.append_child(source);
            }

            for group in &info.source_groups {
                if group.ssrcs.is_empty() {
                    continue;
                }
                let mut group_el = Element::builder("ssrc-group", ns::JINGLE_SSMA)
                    .attr("semantics", group.semantics.as_str())
                    .build();
                for ssrc in &group.ssrcs {
                    group_el.append_child(
                        Element::builder("source", ns::JINGLE_SSMA)
                            .attr("ssrc", ssrc.to_string())
                            .build(),
                    );
                }
                description.append_child(group_el);
            }
        }

        rtcp_fb_to_jingle(media, &mut description, "*");

        for line in util::find_lines(media, "a=extmap:") {
            let Some(extmap) = util::parse_extmap(line) else {
                continue;
            };
            let mut hdrext = Element::builder("rtp-hdrext", ns::JINGLE_RTP_HDREXT)
                .attr("id", extmap.value.as_str())
                .attr("uri", extmap.uri.as_str())
                .build();
            match extmap.direction.as_str() {
                "sendonly" => hdrext.set_attr("senders", "responder"),
                "recvonly" => hdrext.set_attr("senders", "initiator"),
                "sendrecv" => hdrext.set_attr("senders", "both"),
                "inactive" => hdrext.set_attr("senders", "none"),
                _ => {}
            }
            description.append_child(hdrext);
        }

        if util::find_line(media, "a=rtcp-mux").is_some() {
            description.append_child(Element::bare("rtcp-mux", ns::JINGLE_RTP));
        }
        if util::find_line(media, "a=extmap-allow-mixed").is_some() {
            description.append_child(Element::bare("extmap-allow-mixed", ns::JINGLE_RTP));
        }

        description
    }

    fn transport_to_jingle(&self, media: &str, content: &mut Element) {
        let session = Some(self.session.as_str());
        let mut transport = Element::builder("transport", ns::JINGLE_ICE_UDP).build();

        if let Some(port) =
            util::find_line_in(media, "a=sctp-port:", session).and_then(util::parse_sctp_port)
        {
            transport.append_child(
                Element::builder("sctpmap", ns::JINGLE_DTLS_SCTP)
                    .attr("number", port)
                    .attr("protocol", "webrtc-datachannel")
                    .build(),
            );
        } else if let Some(sctpmap) =
            util::find_line_in(media, "a=sctpmap:", session).and_then(util::parse_sctpmap)
        {
            transport.append_child(
                Element::builder("sctpmap", ns::JINGLE_DTLS_SCTP)
                    .attr("number", sctpmap.number)
                    .attr("protocol", sctpmap.protocol)
                    .attr("streams", sctpmap.streams)
                    .build(),
            );
        }

        let setup = util::find_line_in(media, "a=setup:", session)
            .map(|line| line["a=setup:".len()..].to_owned());
        for line in util::find_lines_in(media, "a=fingerprint:", session) {
            let Some(fingerprint) = util::parse_fingerprint(line) else {
                continue;
            };
            transport.append_child(
                Element::builder("fingerprint", ns::JINGLE_DTLS)
                    .attr("hash", fingerprint.hash)
                    .attr("setup", setup.clone())
                    .append(fingerprint.fingerprint)
                    .build(),
            );
        }

        if let Some(ice) = util::ice_params(media, session) {
            transport.set_attr("ufrag", ice.ufrag);
            transport.set_attr("pwd", ice.pwd);

            for line in util::find_lines(media, "a=candidate:") {
                let Some(mut candidate) = util::parse_ice_candidate(line) else {
                    continue;
                };
                if self.fail_ice {
                    candidate.ip = "1.1.1.1".to_owned();
                }
                let protocol = candidate.protocol.to_lowercase();
                if (self.remove_tcp_candidates && (protocol == "tcp" || protocol == "ssltcp"))
                    || (self.remove_udp_candidates && protocol == "udp")
                {
                    continue;
                }
                transport.append_child(
                    Element::builder("candidate", ns::JINGLE_ICE_UDP)
                        .attr("foundation", candidate.foundation)
                        .attr("component", candidate.component)
                        .attr("protocol", candidate.protocol)
                        .attr("priority", candidate.priority)
                        .attr("ip", candidate.ip)
                        .attr("port", candidate.port)
                        .attr("type", candidate.typ)
                        .attr("generation", candidate.generation)
                        .attr("id", candidate.id)
                        .attr("rel-addr", candidate.rel_addr)
                        .attr("rel-port", candidate.rel_port)
                        .attr("tcptype", candidate.tcptype)
                        .attr("network-id", candidate.network_id)
                        .attr("network-cost", candidate.network_cost)
                        .build(),
                );
            }
        }

        content.append_child(transport);
    }

    /// Builds a session description from a `jingle` content tree.
    ///
    /// The translation policy flags are left at their defaults; use
    /// [`SessionDescription::update_from_jingle`] on a prepared value to
    /// override them.
    pub fn from_jingle(jingle: &Element) -> Result<Self> {
        let mut sdp = SessionDescription::default();
        sdp.update_from_jingle(jingle)?;
        Ok(sdp)
    }

    /// Replaces this description's text with one rebuilt from a `jingle`
    /// content tree, honoring the candidate policy flags already set on
    /// `self`.
    ///
    /// A fresh session id is stamped into the `o=` line on every call, so
    /// repeated conversions of the same tree are semantically, not
    /// byte-for-byte, identical.
    pub fn update_from_jingle(&mut self, jingle: &Element) -> Result<()> {
        if jingle.name() != "jingle" {
            return Err(Error::NotJingle(jingle.name().to_owned()));
        }

        let session_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let mut session = format!(
            "v=0{END_LINE}o=- {session_id} 2 IN IP4 0.0.0.0{END_LINE}s=-{END_LINE}t=0 0{END_LINE}"
        );

        for group in jingle
            .children()
            .filter(|c| c.is("group", ns::JINGLE_GROUPING))
        {
            let semantics = group.attr("semantics").or_else(|| group.attr("type"));
            let names: Vec<&str> = group
                .children()
                .filter(|c| c.name() == "content")
                .filter_map(|c| c.attr("name"))
                .collect();
            if let Some(semantics) = semantics {
                if !names.is_empty() {
                    session += &format!("a=group:{semantics} {}{END_LINE}", names.join(" "));
                }
            }
        }

        let media: Vec<String> = jingle
            .children()
            .filter(|c| c.name() == "content")
            .map(|content| self.jingle_to_media(content))
            .collect();

        self.session = session;
        self.media = media;
        self.sync_raw();
        Ok(())
    }

    fn jingle_to_media(&self, content: &Element) -> String {
        let desc = content
            .children()
            .find(|c| c.is("description", ns::JINGLE_RTP));
        let transport = content
            .children()
            .find(|c| c.is("transport", ns::JINGLE_ICE_UDP));
        let sctp = transport.and_then(|t| t.get_child("sctpmap", ns::JINGLE_DTLS_SCTP));
        let has_fingerprint = transport
            .map(|t| t.has_child("fingerprint", ns::JINGLE_DTLS))
            .unwrap_or(false);

        let port = if content.attr("senders") == Some("rejected") {
            "0"
        } else {
            "1"
        };

        let mut sdp = String::new();
        if let Some(sctp) = sctp {
            let number = sctp.attr("number").unwrap_or("");
            sdp += &format!("m=application {port} DTLS/SCTP {number}{END_LINE}");
            sdp += &format!("a=sctpmap:{number} {}", sctp.attr("protocol").unwrap_or(""));
            if let Some(streams) = sctp.attr("streams") {
                sdp += &format!(" {streams}");
            }
            sdp += END_LINE;
        } else {
            let formats = desc
                .map(|d| {
                    d.children()
                        .filter(|c| c.name() == "payload-type")
                        .filter_map(|c| c.attr("id"))
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default();
            let mline = MLine {
                media: desc.and_then(|d| d.attr("media")).unwrap_or("").to_owned(),
                port: port.to_owned(),
                proto: if has_fingerprint { "RTP/SAVPF" } else { "RTP/AVPF" }.to_owned(),
                formats,
            };
            sdp += &util::build_mline(&mline);
            sdp += END_LINE;
        }
        sdp += &format!("c=IN IP4 0.0.0.0{END_LINE}");

        if let Some(transport) = transport {
            if let Some(ufrag) = transport.attr("ufrag") {
                sdp += &util::build_ice_ufrag(ufrag);
                sdp += END_LINE;
            }
            if let Some(pwd) = transport.attr("pwd") {
                sdp += &util::build_ice_pwd(pwd);
                sdp += END_LINE;
            }
            for fingerprint in transport.children().filter(|c| c.name() == "fingerprint") {
                sdp += &format!(
                    "a=fingerprint:{} {}{END_LINE}",
                    fingerprint.attr("hash").unwrap_or(""),
                    fingerprint.text()
                );
                if let Some(setup) = fingerprint.attr("setup") {
                    sdp += &format!("a=setup:{setup}{END_LINE}");
                }
            }
            for candidate in transport.children().filter(|c| c.name() == "candidate") {
                let protocol = candidate
                    .attr("protocol")
                    .map(|p| p.to_lowercase())
                    .unwrap_or_default();
                if (self.remove_tcp_candidates && (protocol == "tcp" || protocol == "ssltcp"))
                    || (self.remove_udp_candidates && protocol == "udp")
                {
                    continue;
                }
                if self.fail_ice {
                    let mut patched = candidate.clone();
                    patched.set_attr("ip", "1.1.1.1");
                    if let Some(line) = util::candidate_from_jingle(&patched) {
                        sdp += &line;
                    }
                } else if let Some(line) = util::candidate_from_jingle(candidate) {
                    sdp += &line;
                }
            }
        }

        if let Some(direction) = content.attr("senders").and_then(Direction::from_senders) {
            sdp += &format!("a={direction}{END_LINE}");
        }
        if let Some(name) = content.attr("name") {
            sdp += &format!("a=mid:{name}{END_LINE}");
        }

        if let Some(desc) = desc {
            if desc.has_child("rtcp-mux", ns::JINGLE_RTP) {
                sdp += "a=rtcp-mux";
                sdp += END_LINE;
            }

            for payload_type in desc.children().filter(|c| c.name() == "payload-type") {
                sdp += &util::build_rtpmap(payload_type);
                sdp += END_LINE;

                let parameters: Vec<String> = payload_type
                    .children()
                    .filter(|c| c.name() == "parameter")
                    .filter_map(|p| match (p.attr("name"), p.attr("value")) {
                        (Some(name), Some(value)) => Some(format!("{name}={value}")),
                        (Some(name), None) => Some(name.to_owned()),
                        (None, Some(value)) => Some(value.to_owned()),
                        (None, None) => None,
                    })
                    .collect();
                if !parameters.is_empty() {
                    sdp += &format!(
                        "a=fmtp:{} {}{END_LINE}",
                        payload_type.attr("id").unwrap_or(""),
                        parameters.join("; ")
                    );
                }

                sdp += &rtcp_fb_from_jingle(payload_type, payload_type.attr("id").unwrap_or(""));
            }

            sdp += &rtcp_fb_from_jingle(desc, "*");

            for hdrext in desc
                .children()
                .filter(|c| c.is("rtp-hdrext", ns::JINGLE_RTP_HDREXT))
            {
                sdp += &format!(
                    "a=extmap:{} {}{END_LINE}",
                    hdrext.attr("id").unwrap_or(""),
                    hdrext.attr("uri").unwrap_or("")
                );
            }
            if desc.has_child("extmap-allow-mixed", ns::JINGLE_RTP) {
                sdp += "a=extmap-allow-mixed";
                sdp += END_LINE;
            }

            for source in desc.children().filter(|c| c.is("source", ns::JINGLE_SSMA)) {
                let Some(ssrc) = source.attr("ssrc") else {
                    continue;
                };
                for parameter in source.children().filter(|c| c.name() == "parameter") {
                    let Some(name) = parameter.attr("name") else {
                        continue;
                    };
                    sdp += &format!("a=ssrc:{ssrc} {name}");
                    if let Some(value) = parameter.attr("value") {
                        let value = util::filter_special_chars(value);
                        if !value.is_empty() {
                            sdp += &format!(":{value}");
                        }
                    }
                    sdp += END_LINE;
                }
            }
            for group in desc
                .children()
                .filter(|c| c.is("ssrc-group", ns::JINGLE_SSMA))
            {
                let Some(semantics) = group.attr("semantics") else {
                    continue;
                };
                let ssrcs: Vec<&str> = group
                    .children()
                    .filter(|c| c.name() == "source")
                    .filter_map(|c| c.attr("ssrc"))
                    .collect();
                if !ssrcs.is_empty() {
                    sdp += &format!("a=ssrc-group:{semantics} {}{END_LINE}", ssrcs.join(" "));
                }
            }
        }

        sdp
    }
}

fn rtcp_fb_to_jingle(media: &str, parent: &mut Element, pt: &str) {
    for line in util::find_lines(media, &format!("a=rtcp-fb:{pt} ")) {
        let Some(feedback) = util::parse_rtcp_fb(line) else {
            continue;
        };
        if feedback.typ == "trr-int" {
            parent.append_child(
                Element::builder("rtcp-fb-trr-int", ns::JINGLE_RTP_RTCP_FB)
                    .attr("value", feedback.params.first().cloned())
                    .build(),
            );
        } else {
            parent.append_child(
                Element::builder("rtcp-fb", ns::JINGLE_RTP_RTCP_FB)
                    .attr("type", feedback.typ)
                    .attr("subtype", feedback.params.first().cloned())
                    .build(),
            );
        }
    }
}

fn rtcp_fb_from_jingle(parent: &Element, pt: &str) -> String {
    let mut sdp = String::new();
    for trr_int in parent
        .children()
        .filter(|c| c.is("rtcp-fb-trr-int", ns::JINGLE_RTP_RTCP_FB))
    {
        sdp += &format!(
            "a=rtcp-fb:* trr-int {}{END_LINE}",
            trr_int.attr("value").unwrap_or("0")
        );
    }
    for feedback in parent
        .children()
        .filter(|c| c.is("rtcp-fb", ns::JINGLE_RTP_RTCP_FB))
    {
        sdp += &format!("a=rtcp-fb:{pt} {}", feedback.attr("type").unwrap_or(""));
        if let Some(subtype) = feedback.attr("subtype") {
            sdp += &format!(" {subtype}");
        }
        sdp += END_LINE;
    }
    sdp
}
