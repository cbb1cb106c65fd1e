use std::collections::BTreeMap;
use std::fmt;

use super::media::{Direction, MediaSourceInfo, MediaType, SsrcInfo};
use crate::util;
use crate::util::END_LINE;

/// SessionDescription holds one SDP blob, split into the session-level
/// header and the ordered `m=` sections. The text is kept verbatim;
/// attribute-level fields are derived on demand by scanning lines.
///
/// The candidate and ICE policy flags are read during `to_jingle`/
/// `from_jingle` only and never mutate the parsed text.
#[derive(Debug, Clone)]
pub struct SessionDescription {
    /// Session-level lines up to the first `m=`, `\r\n`-terminated.
    pub session: String,
    /// One entry per `m=` section, each starting with `m=`.
    pub media: Vec<String>,
    /// The original text; `session` + `media` concatenated.
    pub raw: String,

    /// Drop tcp/ssltcp candidates when translating.
    pub remove_tcp_candidates: bool,
    /// Drop udp candidates when translating.
    pub remove_udp_candidates: bool,
    /// Rewrite every candidate IP to 1.1.1.1, deliberately breaking
    /// connectivity. Test setups only.
    pub fail_ice: bool,
    /// Emit `name`/`videoType` attributes on Jingle sources.
    pub source_name_signaling: bool,
}

impl Default for SessionDescription {
    fn default() -> Self {
        SessionDescription {
            session: String::new(),
            media: vec![],
            raw: String::new(),
            remove_tcp_candidates: false,
            remove_udp_candidates: false,
            fail_ice: false,
            source_name_signaling: true,
        }
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl SessionDescription {
    /// Splits SDP text into the session header and its media sections.
    ///
    /// Never fails: arbitrary text yields a best-effort structure with
    /// missing parts simply absent.
    pub fn parse(sdp: &str) -> Self {
        let chunks: Vec<&str> = sdp.split("\r\nm=").collect();

        let session = if chunks.len() > 1 {
            format!("{}{}", chunks[0], END_LINE)
        } else {
            chunks[0].to_owned()
        };

        let mut media = vec![];
        for (i, chunk) in chunks.iter().enumerate().skip(1) {
            let mut section = format!("m={chunk}");
            if i != chunks.len() - 1 {
                section.push_str(END_LINE);
            }
            media.push(section);
        }

        SessionDescription {
            session,
            media,
            raw: sdp.to_owned(),
            ..Default::default()
        }
    }

    /// Serializes back to SDP text.
    pub fn marshal(&self) -> String {
        self.to_string()
    }

    /// Recomputes `raw` after `session`/`media` were rebuilt.
    pub(crate) fn sync_raw(&mut self) {
        self.raw = format!("{}{}", self.session, self.media.concat());
    }

    /// The media type of section `index`, from its `m=` line.
    pub fn media_type(&self, index: usize) -> Option<MediaType> {
        let media = self.media.get(index)?;
        let (first, _) = media.split_once(END_LINE).unwrap_or((media.as_str(), ""));
        util::parse_mline(first).and_then(|mline| MediaType::new(&mline.media))
    }

    /// The mid of section `index`, when an `a=mid:` line is present.
    pub fn mid(&self, index: usize) -> Option<String> {
        let media = self.media.get(index)?;
        util::find_line(media, "a=mid:").map(|line| line["a=mid:".len()..].to_owned())
    }

    /// The direction of section `index`. When several direction lines are
    /// present, sendrecv wins over sendonly over recvonly over inactive.
    pub fn media_direction(&self, index: usize) -> Option<Direction> {
        let media = self.media.get(index)?;
        let session = Some(self.session.as_str());
        [
            Direction::SendRecv,
            Direction::SendOnly,
            Direction::RecvOnly,
            Direction::Inactive,
        ]
        .into_iter()
        .find(|d| util::find_line_in(media, &format!("a={d}"), session).is_some())
    }

    /// Whether section `index` is rejected: port 0 without `a=bundle-only`.
    pub fn is_rejected(&self, index: usize) -> bool {
        let Some(media) = self.media.get(index) else {
            return false;
        };
        let (first, _) = media.split_once(END_LINE).unwrap_or((media.as_str(), ""));
        let port_zero = util::parse_mline(first)
            .map(|mline| mline.port == "0")
            .unwrap_or(false);
        port_zero && util::find_line(media, "a=bundle-only").is_none()
    }

    /// Collects every section's sources and source groups, keyed by the
    /// zero-based section index.
    pub fn get_media_ssrc_map(&self) -> BTreeMap<usize, MediaSourceInfo> {
        let mut map = BTreeMap::new();

        for (index, media) in self.media.iter().enumerate() {
            let mut info = MediaSourceInfo {
                media_index: index,
                mid: self.mid(index).unwrap_or_else(|| index.to_string()),
                ..Default::default()
            };

            for line in media.lines() {
                if let Some(rest) = line.strip_prefix("a=ssrc:") {
                    let token = rest.split_whitespace().next().unwrap_or("");
                    match token.parse::<u32>() {
                        Ok(ssrc) => {
                            if !info.has_ssrc(ssrc) {
                                info.sources.push(SsrcInfo {
                                    ssrc,
                                    lines: vec![],
                                });
                            }
                            if let Some(source) =
                                info.sources.iter_mut().find(|s| s.ssrc == ssrc)
                            {
                                source.lines.push(line.to_owned());
                            }
                        }
                        Err(err) => log::warn!("failed to parse ssrc '{token}': {err}"),
                    }
                } else if line.starts_with("a=ssrc-group:") {
                    if let Some(group) = util::parse_group_ssrcs(line) {
                        info.source_groups.push(group);
                    }
                }
            }

            map.insert(index, info);
        }

        map
    }

    /// Whether any media section carries the given SSRC.
    pub fn contains_ssrc(&self, ssrc: u32) -> bool {
        self.get_media_ssrc_map()
            .values()
            .any(|info| info.has_ssrc(ssrc))
    }
}
