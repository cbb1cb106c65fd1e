#[cfg(test)]
mod util_test;

use minidom::Element;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::description::media::SsrcGroup;

pub(crate) const END_LINE: &str = "\r\n";

/// ICE candidate attribute, one `a=candidate:` line.
///
/// All fields are kept textual: they round-trip between SDP tokens and
/// Jingle `candidate` element attributes without interpretation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub foundation: String,
    pub component: String,
    pub protocol: String,
    pub priority: String,
    pub ip: String,
    pub port: String,
    pub typ: String,
    pub rel_addr: Option<String>,
    pub rel_port: Option<String>,
    pub generation: String,
    pub tcptype: Option<String>,
    pub network_id: Option<String>,
    pub network_cost: Option<String>,
    /// Raw SDP carries no candidate id; one is synthesized so the Jingle
    /// candidate element is structurally complete. Never compared.
    pub id: String,
}

/// ICE username fragment and password for one media section.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IceParams {
    pub ufrag: String,
    pub pwd: String,
}

/// DTLS fingerprint, one `a=fingerprint:` line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
    pub fingerprint: String,
}

/// Payload type mapping, one `a=rtpmap:` line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RtpMap {
    pub id: String,
    pub name: String,
    pub clockrate: String,
    pub channels: String,
}

/// One `name` or `name=value` entry of an `a=fmtp:` line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FmtpParameter {
    pub name: String,
    pub value: Option<String>,
}

/// RTCP feedback capability, one `a=rtcp-fb:` line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RtcpFb {
    pub pt: String,
    pub typ: String,
    pub params: Vec<String>,
}

/// RTP header extension mapping, one `a=extmap:` line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtMap {
    pub value: String,
    /// `sendonly`/`recvonly`/`sendrecv`/`inactive` suffix, `both` when absent.
    pub direction: String,
    pub uri: String,
    pub params: Vec<String>,
}

/// SDES crypto attribute, one `a=crypto:` line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Crypto {
    pub tag: String,
    pub crypto_suite: String,
    pub key_params: String,
    pub session_params: Option<String>,
}

/// SCTP association description, one `a=sctpmap:` line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SctpMap {
    pub number: String,
    pub protocol: String,
    pub streams: Option<String>,
}

/// The `m=` line of a media section.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MLine {
    pub media: String,
    pub port: String,
    pub proto: String,
    pub formats: Vec<String>,
}

/// Returns the first line of `haystack` starting with `needle`.
pub fn find_line<'a>(haystack: &'a str, needle: &str) -> Option<&'a str> {
    haystack.lines().find(|line| line.starts_with(needle))
}

/// Like [`find_line`], falling back to the session part when the media
/// section has no match.
pub fn find_line_in<'a>(
    haystack: &'a str,
    needle: &str,
    session: Option<&'a str>,
) -> Option<&'a str> {
    find_line(haystack, needle).or_else(|| session.and_then(|s| find_line(s, needle)))
}

/// Returns every line of `haystack` starting with `needle`, in order.
pub fn find_lines<'a>(haystack: &'a str, needle: &str) -> Vec<&'a str> {
    haystack
        .lines()
        .filter(|line| line.starts_with(needle))
        .collect()
}

/// Like [`find_lines`], falling back to the session part only when the media
/// section has no match at all.
pub fn find_lines_in<'a>(
    haystack: &'a str,
    needle: &str,
    session: Option<&'a str>,
) -> Vec<&'a str> {
    let lines = find_lines(haystack, needle);
    if !lines.is_empty() {
        return lines;
    }
    session.map(|s| find_lines(s, needle)).unwrap_or_default()
}

/// Strips the characters msid values must not carry on the wire.
pub fn filter_special_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\\' | '/' | '{' | ',' | '}' | '+'))
        .collect()
}

/// Generates a random SSRC in `[1, 0xffffffff)`.
pub fn generate_ssrc() -> u32 {
    rand::thread_rng().gen_range(1..u32::MAX)
}

fn generate_candidate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}

// candidate-attribute   = "candidate" ":" foundation SP component-id SP
//                            transport SP
//                            priority SP
//                            connection-address SP
//                            port
//                            SP cand-type
//                            [SP rel-addr]
//                            [SP rel-port]
//                            *(SP extension-att-name SP
//                                 extension-att-value)

/// Parses an `a=candidate:` (or bare `candidate:`) line.
///
/// Returns `None` and logs a warning on malformed input, e.g. a line
/// without the `typ` token.
pub fn parse_ice_candidate(line: &str) -> Option<IceCandidate> {
    let rest = match line
        .strip_prefix("a=candidate:")
        .or_else(|| line.strip_prefix("candidate:"))
    {
        Some(rest) => rest,
        None => {
            log::warn!("not an ice candidate line: {line}");
            return None;
        }
    };

    let elems: Vec<&str> = rest.split_whitespace().collect();
    if elems.len() < 8 || elems[6] != "typ" {
        log::warn!("could not find typ in the right place, candidate skipped: {line}");
        return None;
    }

    let mut candidate = IceCandidate {
        foundation: elems[0].to_owned(),
        component: elems[1].to_owned(),
        protocol: elems[2].to_lowercase(),
        priority: elems[3].to_owned(),
        ip: elems[4].to_owned(),
        port: elems[5].to_owned(),
        typ: elems[7].to_owned(),
        generation: "0".to_owned(),
        id: generate_candidate_id(),
        ..Default::default()
    };

    let mut i = 8;
    while i + 1 < elems.len() {
        match elems[i] {
            "raddr" => candidate.rel_addr = Some(elems[i + 1].to_owned()),
            "rport" => candidate.rel_port = Some(elems[i + 1].to_owned()),
            "generation" => candidate.generation = elems[i + 1].to_owned(),
            "tcptype" => candidate.tcptype = Some(elems[i + 1].to_owned()),
            "network-id" => candidate.network_id = Some(elems[i + 1].to_owned()),
            "network-cost" => candidate.network_cost = Some(elems[i + 1].to_owned()),
            other => {
                log::debug!("not translating '{}' = '{}'", other, elems[i + 1]);
            }
        }
        i += 2;
    }

    Some(candidate)
}

/// Rebuilds an `a=candidate:` line from a Jingle `candidate` element.
///
/// `raddr`/`rport` are emitted only for reflexive and relayed candidates,
/// `tcptype` only for TCP ones. The line is `\r\n`-terminated.
pub fn candidate_from_jingle(cand: &Element) -> Option<String> {
    let attr = |name: &str| cand.attr(name).map(str::to_owned);

    let (foundation, component, protocol, priority, ip, port, typ) = match (
        attr("foundation"),
        attr("component"),
        attr("protocol"),
        attr("priority"),
        attr("ip"),
        attr("port"),
        attr("type"),
    ) {
        (Some(f), Some(c), Some(pr), Some(p), Some(ip), Some(port), Some(t)) => {
            (f, c, pr, p, ip, port, t)
        }
        _ => {
            log::warn!("candidate element is missing a required attribute, skipped");
            return None;
        }
    };

    let mut line = format!(
        "a=candidate:{foundation} {component} {protocol} {priority} {ip} {port} typ {typ}"
    );

    if matches!(typ.as_str(), "srflx" | "prflx" | "relay") {
        if let (Some(rel_addr), Some(rel_port)) = (cand.attr("rel-addr"), cand.attr("rel-port")) {
            line += &format!(" raddr {rel_addr} rport {rel_port}");
        }
    }
    if protocol.eq_ignore_ascii_case("tcp") {
        if let Some(tcptype) = cand.attr("tcptype") {
            line += &format!(" tcptype {tcptype}");
        }
    }
    line += &format!(" generation {}", cand.attr("generation").unwrap_or("0"));
    line += END_LINE;

    Some(line)
}

/// ICE credentials for a media section, falling back to the session part.
pub fn ice_params(media: &str, session: Option<&str>) -> Option<IceParams> {
    let ufrag = find_line_in(media, "a=ice-ufrag:", session).and_then(parse_ice_ufrag);
    let pwd = find_line_in(media, "a=ice-pwd:", session).and_then(parse_ice_pwd);
    match (ufrag, pwd) {
        (Some(ufrag), Some(pwd)) => Some(IceParams { ufrag, pwd }),
        _ => None,
    }
}

pub fn parse_ice_ufrag(line: &str) -> Option<String> {
    line.strip_prefix("a=ice-ufrag:").map(str::to_owned)
}

pub fn build_ice_ufrag(frag: &str) -> String {
    format!("a=ice-ufrag:{frag}")
}

pub fn parse_ice_pwd(line: &str) -> Option<String> {
    line.strip_prefix("a=ice-pwd:").map(str::to_owned)
}

pub fn build_ice_pwd(pwd: &str) -> String {
    format!("a=ice-pwd:{pwd}")
}

/// Parses an `a=fingerprint:` line into hash function and digest.
pub fn parse_fingerprint(line: &str) -> Option<Fingerprint> {
    let rest = line.strip_prefix("a=fingerprint:")?;
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(hash), Some(fingerprint)) => Some(Fingerprint {
            hash: hash.to_owned(),
            fingerprint: fingerprint.to_owned(),
        }),
        _ => {
            log::warn!("could not parse fingerprint line: {line}");
            None
        }
    }
}

/// Parses an `a=rtpmap:` line. `channels` defaults to `"1"`.
pub fn parse_rtpmap(line: &str) -> Option<RtpMap> {
    let rest = line.strip_prefix("a=rtpmap:")?;
    let mut parts = rest.split_whitespace();
    let id = parts.next()?;
    let codec = match parts.next() {
        Some(codec) => codec,
        None => {
            log::warn!("could not parse rtpmap line: {line}");
            return None;
        }
    };
    let mut pieces = codec.split('/');
    let name = pieces.next()?;
    let clockrate = pieces.next().unwrap_or("");
    let channels = pieces.next().unwrap_or("1");

    Some(RtpMap {
        id: id.to_owned(),
        name: name.to_owned(),
        clockrate: clockrate.to_owned(),
        channels: channels.to_owned(),
    })
}

/// Rebuilds an `a=rtpmap:` line from a Jingle `payload-type` element.
pub fn build_rtpmap(payload_type: &Element) -> String {
    let mut line = format!(
        "a=rtpmap:{} {}/{}",
        payload_type.attr("id").unwrap_or(""),
        payload_type.attr("name").unwrap_or(""),
        payload_type.attr("clockrate").unwrap_or(""),
    );
    if let Some(channels) = payload_type.attr("channels") {
        if channels != "1" {
            line += &format!("/{channels}");
        }
    }
    line
}

/// Parses the parameter list of an `a=fmtp:` line.
pub fn parse_fmtp(line: &str) -> Option<Vec<FmtpParameter>> {
    let rest = match line.find(' ') {
        Some(idx) => &line[idx + 1..],
        None => {
            log::warn!("could not parse fmtp line: {line}");
            return None;
        }
    };

    let mut parameters = vec![];
    for piece in rest.split(';') {
        let mut kv = piece.splitn(2, '=');
        let name = kv.next().unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }
        parameters.push(FmtpParameter {
            name: name.to_owned(),
            value: kv.next().map(str::to_owned),
        });
    }
    Some(parameters)
}

/// Parses an `a=rtcp-fb:` line into payload type, feedback type and params.
pub fn parse_rtcp_fb(line: &str) -> Option<RtcpFb> {
    let rest = line.strip_prefix("a=rtcp-fb:")?;
    let mut parts = rest.split_whitespace();
    let pt = parts.next()?;
    let typ = match parts.next() {
        Some(typ) => typ,
        None => {
            log::warn!("could not parse rtcp-fb line: {line}");
            return None;
        }
    };
    Some(RtcpFb {
        pt: pt.to_owned(),
        typ: typ.to_owned(),
        params: parts.map(str::to_owned).collect(),
    })
}

/// Parses an `a=extmap:` line. A missing direction suffix maps to `both`.
pub fn parse_extmap(line: &str) -> Option<ExtMap> {
    let rest = line.strip_prefix("a=extmap:")?;
    let mut parts = rest.split_whitespace();
    let value = parts.next()?;
    let (value, direction) = match value.split_once('/') {
        Some((value, direction)) => (value, direction),
        None => (value, "both"),
    };
    let uri = match parts.next() {
        Some(uri) => uri,
        None => {
            log::warn!("could not parse extmap line: {line}");
            return None;
        }
    };

    Some(ExtMap {
        value: value.to_owned(),
        direction: direction.to_owned(),
        uri: uri.to_owned(),
        params: parts.map(str::to_owned).collect(),
    })
}

/// Parses an `a=crypto:` line.
pub fn parse_crypto(line: &str) -> Option<Crypto> {
    let rest = line.strip_prefix("a=crypto:")?;
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(tag), Some(crypto_suite), Some(key_params)) => {
            let session_params: Vec<&str> = parts.collect();
            Some(Crypto {
                tag: tag.to_owned(),
                crypto_suite: crypto_suite.to_owned(),
                key_params: key_params.to_owned(),
                session_params: if session_params.is_empty() {
                    None
                } else {
                    Some(session_params.join(" "))
                },
            })
        }
        _ => {
            log::warn!("could not parse crypto line: {line}");
            None
        }
    }
}

/// Parses an `a=sctpmap:` line.
pub fn parse_sctpmap(line: &str) -> Option<SctpMap> {
    let rest = line.strip_prefix("a=sctpmap:")?;
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(number), Some(protocol)) => Some(SctpMap {
            number: number.to_owned(),
            protocol: protocol.to_owned(),
            streams: parts.next().map(str::to_owned),
        }),
        _ => {
            log::warn!("could not parse sctpmap line: {line}");
            None
        }
    }
}

pub fn parse_sctp_port(line: &str) -> Option<String> {
    line.strip_prefix("a=sctp-port:").map(str::to_owned)
}

/// Parses an `m=` line.
pub fn parse_mline(line: &str) -> Option<MLine> {
    let rest = line.strip_prefix("m=")?;
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(media), Some(port), Some(proto)) => Some(MLine {
            media: media.to_owned(),
            port: port.to_owned(),
            proto: proto.to_owned(),
            formats: parts.map(str::to_owned).collect(),
        }),
        _ => {
            log::warn!("could not parse m-line: {line}");
            None
        }
    }
}

pub fn build_mline(mline: &MLine) -> String {
    format!(
        "m={} {} {} {}",
        mline.media,
        mline.port,
        mline.proto,
        mline.formats.join(" ")
    )
}

/// Parses an `a=ssrc-group:` line. SSRC tokens that do not parse are
/// skipped with a warning.
pub fn parse_group_ssrcs(line: &str) -> Option<SsrcGroup> {
    let rest = line.strip_prefix("a=ssrc-group:")?;
    let mut parts = rest.split_whitespace();
    let semantics = parts.next()?;

    let mut ssrcs = vec![];
    for token in parts {
        match token.parse::<u32>() {
            Ok(ssrc) => ssrcs.push(ssrc),
            Err(err) => log::warn!("failed to parse ssrc '{token}' in group: {err}"),
        }
    }
    Some(SsrcGroup {
        semantics: semantics.to_owned(),
        ssrcs,
    })
}

/// Returns the value of `attr` for the given SSRC in a media section, e.g.
/// `get_ssrc_attribute(media, 1234, "cname")`.
pub fn get_ssrc_attribute(media: &str, ssrc: u32, attr: &str) -> Option<String> {
    let needle = format!("a=ssrc:{ssrc} ");
    let attr_prefix = format!("{attr}:");
    find_lines(media, &needle)
        .into_iter()
        .find_map(|line| line[needle.len()..].strip_prefix(&attr_prefix))
        .map(str::to_owned)
}

/// Distinct SSRCs of a media section, in order of first appearance.
pub fn parse_media_ssrcs(media: &str) -> Vec<u32> {
    let mut ssrcs: Vec<u32> = vec![];
    for line in find_lines(media, "a=ssrc:") {
        let token = line["a=ssrc:".len()..]
            .split_whitespace()
            .next()
            .unwrap_or("");
        match token.parse::<u32>() {
            Ok(ssrc) => {
                if !ssrcs.contains(&ssrc) {
                    ssrcs.push(ssrc);
                }
            }
            Err(err) => log::warn!("failed to parse ssrc '{token}': {err}"),
        }
    }
    ssrcs
}

/// Finds the SSRC carrying the primary video encoding of a media section.
///
/// A lone SSRC is primary. With two SSRCs the first member of an FID group
/// is primary, with three or more the first member of a SIM group. Anything
/// else is ambiguous and yields `None`; that is an expected outcome, not an
/// error.
pub fn parse_primary_video_ssrc(media: &str) -> Option<u32> {
    let ssrcs = parse_media_ssrcs(media);
    let groups: Vec<SsrcGroup> = find_lines(media, "a=ssrc-group:")
        .into_iter()
        .filter_map(parse_group_ssrcs)
        .collect();

    if ssrcs.len() > 1 && groups.is_empty() {
        return None;
    }
    match ssrcs.len() {
        0 => None,
        1 => Some(ssrcs[0]),
        2 => groups
            .iter()
            .find(|g| g.semantics == "FID")
            .and_then(|g| g.ssrcs.first())
            .copied(),
        _ => groups
            .iter()
            .find(|g| g.semantics == "SIM")
            .and_then(|g| g.ssrcs.first())
            .copied(),
    }
}

fn rtpmap_for(media: &str, pt: &str) -> Option<RtpMap> {
    find_line(media, &format!("a=rtpmap:{pt} ")).and_then(parse_rtpmap)
}

fn fmtp_for(media: &str, pt: &str) -> Vec<FmtpParameter> {
    find_line(media, &format!("a=fmtp:{pt} "))
        .and_then(parse_fmtp)
        .unwrap_or_default()
}

fn split_first_line(media: &str) -> (&str, &str) {
    match media.find(END_LINE) {
        Some(idx) => (&media[..idx], &media[idx..]),
        None => (media, ""),
    }
}

/// Moves every payload type of `codec_name` to the front of the payload
/// list, keeping the relative order of matches and of everything else.
///
/// With `sort_by_packetization_mode` set and H264 as the codec, payload
/// types whose fmtp carries `packetization-mode=0` go ahead of the other
/// matches. Returns the rewritten media section.
pub fn prefer_codec(media: &str, codec_name: &str, sort_by_packetization_mode: bool) -> String {
    let (first, rest) = split_first_line(media);
    let mut mline = match parse_mline(first) {
        Some(mline) => mline,
        None => return media.to_owned(),
    };

    let mut matching: Vec<String> = mline
        .formats
        .iter()
        .filter(|pt| {
            rtpmap_for(media, pt.as_str())
                .map(|rtpmap| rtpmap.name.eq_ignore_ascii_case(codec_name))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    if matching.is_empty() {
        return media.to_owned();
    }

    if sort_by_packetization_mode && codec_name.eq_ignore_ascii_case("H264") {
        let has_mode0 = |pt: &String| {
            fmtp_for(media, pt)
                .iter()
                .any(|p| p.name == "packetization-mode" && p.value.as_deref() == Some("0"))
        };
        let (mode0, others): (Vec<String>, Vec<String>) =
            matching.into_iter().partition(|pt| has_mode0(pt));
        matching = mode0.into_iter().chain(others).collect();
    }

    let remaining: Vec<String> = mline
        .formats
        .iter()
        .filter(|pt| !matching.contains(*pt))
        .cloned()
        .collect();
    mline.formats = matching.into_iter().chain(remaining).collect();

    format!("{}{}", build_mline(&mline), rest)
}

/// Removes every payload type of `codec_name` from the media section,
/// together with the RTX payload types whose `apt=` references them and
/// their `a=rtpmap:`/`a=fmtp:`/`a=rtcp-fb:` lines.
///
/// With `high_profile_only` set, removal is limited to high-profile
/// payloads (VP9 without `profile-id=0`, H264 without a
/// `profile-level-id=42` prefix). Stripping the last payload type never
/// yields an empty m-line: the section is rewritten to `port=0`,
/// `a=inactive` and a `*` payload list instead.
pub fn strip_codec(media: &str, codec_name: &str, high_profile_only: bool) -> String {
    let (first, _) = split_first_line(media);
    let mut mline = match parse_mline(first) {
        Some(mline) => mline,
        None => return media.to_owned(),
    };

    let codec = codec_name.to_lowercase();
    let mut remove: Vec<String> = vec![];
    for pt in &mline.formats {
        let matches = rtpmap_for(media, pt)
            .map(|rtpmap| rtpmap.name.eq_ignore_ascii_case(codec_name))
            .unwrap_or(false);
        if !matches {
            continue;
        }
        if high_profile_only {
            let config = find_line(media, &format!("a=fmtp:{pt} "))
                .map(str::to_owned)
                .unwrap_or_default();
            let high = (codec == "vp9" && !config.contains("profile-id=0"))
                || (codec == "h264" && !config.contains("profile-level-id=42"));
            if high {
                remove.push(pt.clone());
            }
        } else {
            remove.push(pt.clone());
        }
    }
    if remove.is_empty() {
        return media.to_owned();
    }

    // rtx payloads that repaired a removed payload go with it
    let rtx: Vec<String> = mline
        .formats
        .iter()
        .filter(|pt| {
            fmtp_for(media, pt.as_str())
                .iter()
                .any(|p| {
                    p.name == "apt"
                        && p.value
                            .as_deref()
                            .is_some_and(|v| remove.iter().any(|r| r == v))
                })
        })
        .cloned()
        .collect();
    for pt in rtx {
        if !remove.contains(&pt) {
            remove.push(pt);
        }
    }

    mline.formats.retain(|pt| !remove.contains(pt));
    let emptied = mline.formats.is_empty();
    if emptied {
        mline.port = "0".to_owned();
        mline.formats = vec!["*".to_owned()];
    }

    let is_direction = |line: &str| {
        matches!(
            line,
            "a=sendrecv" | "a=sendonly" | "a=recvonly" | "a=inactive"
        )
    };
    let removed_attr = |line: &str| {
        remove.iter().any(|pt| {
            line.starts_with(&format!("a=rtpmap:{pt} "))
                || line.starts_with(&format!("a=fmtp:{pt} "))
                || line.starts_with(&format!("a=rtcp-fb:{pt} "))
        })
    };

    let mut out: Vec<String> = vec![];
    let mut direction_written = false;
    for (i, line) in media.split(END_LINE).enumerate() {
        if i == 0 {
            out.push(build_mline(&mline));
            continue;
        }
        if removed_attr(line) {
            continue;
        }
        if emptied && is_direction(line) {
            if !direction_written {
                out.push("a=inactive".to_owned());
                direction_written = true;
            }
            continue;
        }
        out.push(line.to_owned());
    }
    if emptied && !direction_written {
        out.insert(1, "a=inactive".to_owned());
    }
    out.join(END_LINE)
}
