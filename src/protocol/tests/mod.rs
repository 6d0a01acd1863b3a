use std::net::SocketAddr;

use rstest::*;

use super::*;

fn table() -> PeerTable {
    PeerTable::new(vec![
        (SocketAddr::from(([127, 0, 0, 1], 4000)), 10),
        (SocketAddr::from(([127, 0, 0, 1], 4001)), 20),
        (SocketAddr::from(([127, 0, 0, 1], 4002)), 20),
        (SocketAddr::from(([127, 0, 0, 1], 4003)), 5),
    ])
    .unwrap()
}

#[test]
pub fn test_wire_layout() {
    let table = table();
    let peer = table.get(2).unwrap();

    assert_eq!(&Message::election(peer).encode()[..], &[ELECTION, 2, 20]);
    assert_eq!(&Message::result(peer).encode()[..], &[RESULT, 2, 20]);
    assert_eq!(&Message::Response.encode()[..], &[RESPONSE]);
}

#[rstest]
#[case::election(Message::Election(Candidate { id: 0, aptitude: 10 }))]
#[case::result(Message::Result(Candidate { id: 3, aptitude: 5 }))]
#[case::response(Message::Response)]
pub fn test_decode_what_was_encoded(#[case] message: Message) {
    let bytes = encode(&message);
    assert!(!bytes.is_empty() && bytes.len() <= MAX_MESSAGE_LENGTH);
    assert_eq!(decode(&bytes, &table()), Ok(message));
}

#[rstest]
#[case::empty(&[0u8; 0], ProtocolErrorKind::Empty)]
#[case::unknown_tag(&[7], ProtocolErrorKind::UnknownTag(7))]
#[case::unknown_tag_with_payload(&[3, 1, 20], ProtocolErrorKind::UnknownTag(3))]
#[case::too_long(&[ELECTION, 1, 20, 0], ProtocolErrorKind::TooLong(4))]
#[case::truncated_election(&[ELECTION, 1], ProtocolErrorKind::BadLength { tag: ELECTION, len: 2 })]
#[case::bare_result(&[RESULT], ProtocolErrorKind::BadLength { tag: RESULT, len: 1 })]
#[case::response_with_payload(&[RESPONSE, 1], ProtocolErrorKind::BadLength { tag: RESPONSE, len: 2 })]
#[case::id_out_of_range(&[ELECTION, 4, 20], ProtocolErrorKind::UnknownPeer(4))]
#[case::id_far_out_of_range(&[RESULT, 255, 20], ProtocolErrorKind::UnknownPeer(255))]
#[case::wrong_aptitude(&[RESULT, 1, 21], ProtocolErrorKind::AptitudeMismatch { id: 1, expected: 20, found: 21 })]
pub fn test_decode_errors(#[case] bytes: &[u8], #[case] expected: ProtocolErrorKind) {
    let err = decode(bytes, &table()).unwrap_err();
    assert_eq!(err.kind(), &expected);
}

#[test]
pub fn test_every_byte_decodes_without_panicking() {
    let table = table();

    for tag in 0..=u8::MAX {
        for id in 0..=u8::MAX {
            let decoded = decode(&[tag, id, 20], &table);

            match decoded {
                Ok(Message::Election(candidate)) | Ok(Message::Result(candidate)) => {
                    assert!(table.contains(candidate.id));
                }
                Ok(Message::Response) => panic!("3-byte response decoded"),
                Err(_) => {}
            }
        }
    }
}

#[test]
pub fn test_subject() {
    let table = table();
    assert_eq!(Message::election(table.get(1).unwrap()).subject(), Some(1));
    assert_eq!(Message::result(table.get(3).unwrap()).subject(), Some(3));
    assert_eq!(Message::Response.subject(), None);
}

#[test]
pub fn test_probe_codec() {
    assert_eq!(decode_probe(&Probe::Ping.encode()), Ok(Probe::Ping));
    assert_eq!(decode_probe(&Probe::Ack.encode()), Ok(Probe::Ack));

    assert_eq!(
        decode_probe(&[]).unwrap_err().kind(),
        &ProtocolErrorKind::Empty
    );
    assert_eq!(
        decode_probe(&[9]).unwrap_err().kind(),
        &ProtocolErrorKind::UnknownTag(9)
    );
    assert_eq!(
        decode_probe(&[PROBE, PROBE]).unwrap_err().kind(),
        &ProtocolErrorKind::TooLong(2)
    );
}
