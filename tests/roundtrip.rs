//! End-to-end package round-trip scenarios (§8).

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use obscurcore::primitives::curve::generate_keypair;
use obscurcore::primitives::CurveKind;
use obscurcore::{AuthScope, Error, MuxScheme, PackageReader, PackageWriter, TempStorage};

struct RcVecWriter(Rc<RefCell<Vec<u8>>>);

impl std::io::Write for RcVecWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn pack(writer: &mut PackageWriter) -> Vec<u8> {
    let mut out = Vec::new();
    writer.write(&mut out, true).unwrap();
    out
}

fn unpack_all(reader: &PackageReader, packed: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    let mut cursor = Cursor::new(packed);
    let manifest = reader.read_manifest(&mut cursor).unwrap();
    let names: Vec<String> = manifest.items().iter().map(|item| item.relative_path.clone()).collect();
    let slots: Vec<Rc<RefCell<Vec<u8>>>> = names.iter().map(|_| Rc::new(RefCell::new(Vec::new()))).collect();
    let for_sinks = slots.clone();
    let mut next = 0usize;
    reader
        .extract_to(manifest, &mut cursor, move |_item| {
            let slot = for_sinks[next].clone();
            next += 1;
            Ok(Box::new(RcVecWriter(slot)) as Box<dyn std::io::Write>)
        })
        .unwrap();
    names.into_iter().zip(slots.into_iter().map(|slot| slot.borrow().clone())).collect()
}

#[test]
fn scenario_1_empty_item_under_frameshift_roundtrips() {
    let mut writer = PackageWriter::with_symmetric_key(b"scenario one pre-key material".to_vec());
    writer.set_payload_layout(MuxScheme::Frameshift { pad_min: 8, pad_max: 64 });
    writer.add_text("empty", "");
    let packed = pack(&mut writer);

    let reader = PackageReader::with_symmetric_key(b"scenario one pre-key material".to_vec());
    let items = unpack_all(&reader, packed);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].0, "empty");
    assert!(items[0].1.is_empty());
}

#[test]
fn scenario_2_large_item_under_frameshift_tamper_fails() {
    let mut writer = PackageWriter::with_symmetric_key(b"scenario two pre-key material".to_vec());
    writer.set_payload_layout(MuxScheme::Frameshift { pad_min: 16, pad_max: 128 });
    writer.add_text("big", "a".repeat(1 << 20).as_str());
    let mut packed = pack(&mut writer);

    let reader = PackageReader::with_symmetric_key(b"scenario two pre-key material".to_vec());
    let items = unpack_all(&reader, packed.clone());
    assert_eq!(items[0].1.len(), 1 << 20);

    let last = packed.len() - 9;
    packed[last] ^= 0xFF;
    let mut cursor = Cursor::new(packed);
    let manifest = reader.read_manifest(&mut cursor).unwrap();
    let err = reader
        .extract_to(manifest, &mut cursor, |_item| Ok(Box::new(Vec::new()) as Box<dyn std::io::Write>))
        .unwrap_err();
    assert!(matches!(err, Error::CiphertextAuthentication(AuthScope::PayloadItem) | Error::FormatInvalid(_)));
}

#[test]
fn scenario_3_three_items_under_um1_secp256r1() {
    let (sender_pub, sender_priv) = generate_keypair(CurveKind::Secp256r1);
    let (recipient_pub, recipient_priv) = generate_keypair(CurveKind::Secp256r1);
    let (wrong_sender_pub, _wrong_sender_priv) = generate_keypair(CurveKind::Secp256r1);

    let mut writer = PackageWriter::with_um1(sender_priv, recipient_pub);
    writer.add_text("small", "a".repeat(100).as_str());
    writer.add_text("medium", "b".repeat(10 * 1024).as_str());
    writer.add_text("large", "c".repeat(1 << 20).as_str());
    let packed = pack(&mut writer);

    let reader = PackageReader::with_um1(recipient_priv, sender_pub);
    let items = unpack_all(&reader, packed.clone());
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].1.len(), 100);
    assert_eq!(items[1].1.len(), 10 * 1024);
    assert_eq!(items[2].1.len(), 1 << 20);

    let (_, recipient_priv_2) = generate_keypair(CurveKind::Secp256r1);
    let bad_reader = PackageReader::with_um1(recipient_priv_2, wrong_sender_pub);
    let mut cursor = Cursor::new(packed);
    let err = bad_reader.read_manifest(&mut cursor).unwrap_err();
    assert!(matches!(err, Error::CiphertextAuthentication(AuthScope::Manifest)));
}

#[test]
fn scenario_4_wrong_pre_key_fails_fast() {
    let mut writer = PackageWriter::with_symmetric_key(b"the correct pre-key material!!!".to_vec());
    writer.add_text("note", "payload contents");
    let packed = pack(&mut writer);

    let mut wrong_key = b"the correct pre-key material!!!".to_vec();
    wrong_key[0] ^= 0x01;
    let reader = PackageReader::with_symmetric_key(wrong_key);
    let mut cursor = Cursor::new(packed);
    let err = reader.read_manifest(&mut cursor).unwrap_err();
    assert!(matches!(err, Error::CiphertextAuthentication(AuthScope::Manifest)));
}

#[test]
fn scenario_5_truncated_trailer_is_format_invalid() {
    let mut writer = PackageWriter::with_symmetric_key(b"truncation scenario pre-key".to_vec());
    writer.set_payload_layout(MuxScheme::Frameshift { pad_min: 16, pad_max: 128 });
    writer.add_text("item", "x".repeat(1 << 20).as_str());
    let mut packed = pack(&mut writer);
    packed.truncate(packed.len() - 8);

    let reader = PackageReader::with_symmetric_key(b"truncation scenario pre-key".to_vec());
    let mut cursor = Cursor::new(packed);
    let manifest = reader.read_manifest(&mut cursor).unwrap();
    let err = reader
        .extract_to(manifest, &mut cursor, |_item| Ok(Box::new(Vec::new()) as Box<dyn std::io::Write>))
        .unwrap_err();
    assert!(matches!(err, Error::FormatInvalid(_)));
}

#[test]
fn file_backed_temp_storage_roundtrips_like_in_memory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let temp_path = temp_dir.path().join("payload.tmp");

    let mut writer = PackageWriter::with_symmetric_key(b"file backed temp storage key".to_vec());
    writer.set_temp_storage(TempStorage::File(temp_path));
    writer.add_text("first", "alpha");
    writer.add_text("second", "a somewhat longer payload item for good measure");
    let packed = pack(&mut writer);

    let reader = PackageReader::with_symmetric_key(b"file backed temp storage key".to_vec());
    let items = unpack_all(&reader, packed);
    assert_eq!(items[0], ("first".to_string(), b"alpha".to_vec()));
    assert_eq!(items[1], ("second".to_string(), b"a somewhat longer payload item for good measure".to_vec()));
}

#[test]
fn multi_item_simple_layout_roundtrips_in_order() {
    let mut writer = PackageWriter::with_symmetric_key(b"multi item pre-key material".to_vec());
    writer.add_text("first", "alpha");
    writer.add_text("second", "beta beta beta");
    writer.add_text("third", "");
    let packed = pack(&mut writer);

    let reader = PackageReader::with_symmetric_key(b"multi item pre-key material".to_vec());
    let items = unpack_all(&reader, packed);
    assert_eq!(items[0], ("first".to_string(), b"alpha".to_vec()));
    assert_eq!(items[1], ("second".to_string(), b"beta beta beta".to_vec()));
    assert_eq!(items[2], ("third".to_string(), Vec::new()));
}
