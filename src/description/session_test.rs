use super::media::*;
use super::session::SessionDescription;

const CANONICAL_SDP: &str = "v=0\r\n\
     o=- 814997227879783433 2 IN IP4 0.0.0.0\r\n\
     s=-\r\n\
     t=0 0\r\n\
     a=group:BUNDLE audio video\r\n\
     a=msid-semantic: WMS\r\n\
     m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
     c=IN IP4 0.0.0.0\r\n\
     a=mid:audio\r\n\
     a=sendrecv\r\n\
     a=rtpmap:111 opus/48000/2\r\n\
     a=ssrc:2002 cname:juejgy8a01\r\n\
     a=ssrc:2002 name:a8f7g30-a0\r\n\
     m=video 9 UDP/TLS/RTP/SAVPF 100\r\n\
     c=IN IP4 0.0.0.0\r\n\
     a=mid:video\r\n\
     a=recvonly\r\n\
     a=rtpmap:100 VP8/90000\r\n\
     a=ssrc:984899560 cname:juejgy8a01\r\n\
     a=ssrc:1757014965 cname:juejgy8a01\r\n\
     a=ssrc-group:FID 1757014965 984899560\r\n";

#[test]
fn test_parse_marshal_round_trip() {
    let sdp = SessionDescription::parse(CANONICAL_SDP);
    assert_eq!(sdp.marshal(), CANONICAL_SDP);
}

#[test]
fn test_parse_sections() {
    let sdp = SessionDescription::parse(CANONICAL_SDP);

    assert!(sdp.session.starts_with("v=0\r\n"));
    assert!(sdp.session.ends_with("a=msid-semantic: WMS\r\n"));
    assert_eq!(sdp.media.len(), 2);
    assert!(sdp.media[0].starts_with("m=audio 9"));
    assert!(sdp.media[0].ends_with("\r\n"));
    assert!(sdp.media[1].starts_with("m=video 9"));

    assert_eq!(sdp.media_type(0), Some(MediaType::Audio));
    assert_eq!(sdp.media_type(1), Some(MediaType::Video));
    assert_eq!(sdp.mid(0).as_deref(), Some("audio"));
    assert_eq!(sdp.mid(1).as_deref(), Some("video"));
}

#[test]
fn test_parse_never_fails() {
    let garbage = SessionDescription::parse("this is not sdp at all");
    assert_eq!(garbage.media.len(), 0);
    assert_eq!(garbage.marshal(), "this is not sdp at all");

    let empty = SessionDescription::parse("");
    assert_eq!(empty.media.len(), 0);
    assert_eq!(empty.marshal(), "");
}

#[test]
fn test_media_direction_precedence() {
    let sdp = SessionDescription::parse(CANONICAL_SDP);
    assert_eq!(sdp.media_direction(0), Some(Direction::SendRecv));
    assert_eq!(sdp.media_direction(1), Some(Direction::RecvOnly));

    // sendrecv wins when several direction lines are present
    let conflicting = SessionDescription::parse(
        "v=0\r\nm=audio 9 RTP/SAVPF 111\r\na=inactive\r\na=sendrecv\r\n",
    );
    assert_eq!(conflicting.media_direction(0), Some(Direction::SendRecv));

    let none = SessionDescription::parse("v=0\r\nm=audio 9 RTP/SAVPF 111\r\na=mid:audio\r\n");
    assert_eq!(none.media_direction(0), None);
}

#[test]
fn test_is_rejected() {
    let rejected =
        SessionDescription::parse("v=0\r\nm=video 0 UDP/TLS/RTP/SAVPF 100\r\na=mid:video\r\n");
    assert!(rejected.is_rejected(0));

    let bundle_only = SessionDescription::parse(
        "v=0\r\nm=video 0 UDP/TLS/RTP/SAVPF 100\r\na=mid:video\r\na=bundle-only\r\n",
    );
    assert!(!bundle_only.is_rejected(0));

    let active =
        SessionDescription::parse("v=0\r\nm=video 9 UDP/TLS/RTP/SAVPF 100\r\na=mid:video\r\n");
    assert!(!active.is_rejected(0));
}

#[test]
fn test_get_media_ssrc_map() {
    let sdp = SessionDescription::parse(CANONICAL_SDP);
    let map = sdp.get_media_ssrc_map();

    assert_eq!(map.len(), 2);

    let audio = &map[&0];
    assert_eq!(audio.mid, "audio");
    assert_eq!(audio.sources.len(), 1);
    assert_eq!(audio.sources[0].ssrc, 2002);
    assert_eq!(audio.sources[0].lines.len(), 2);
    assert_eq!(audio.sources[0].source_name(), Some("a8f7g30-a0"));

    let video = &map[&1];
    // first-appearance order, the rtx ssrc came first in the text
    assert_eq!(video.sources[0].ssrc, 984899560);
    assert_eq!(video.sources[1].ssrc, 1757014965);
    assert_eq!(video.source_groups.len(), 1);
    assert_eq!(video.source_groups[0].semantics, "FID");
    assert_eq!(video.source_groups[0].ssrcs, vec![1757014965, 984899560]);
}

#[test]
fn test_mid_synthesized_from_index() {
    let sdp = SessionDescription::parse("v=0\r\nm=audio 9 RTP/SAVPF 111\r\na=ssrc:1 cname:x\r\n");
    let map = sdp.get_media_ssrc_map();
    assert_eq!(map[&0].mid, "0");
}

#[test]
fn test_contains_ssrc() {
    let sdp = SessionDescription::parse(CANONICAL_SDP);
    assert!(sdp.contains_ssrc(2002));
    assert!(sdp.contains_ssrc(1757014965));
    assert!(!sdp.contains_ssrc(12345));
}
