//! Files written by `ClassicWriter` read back through `Dataset`.

use vv_netcdf::{AttrValue, ClassicWriter, Dataset, NcType, NetcdfError};

fn two_record_vars() -> ClassicWriter {
    let mut writer = ClassicWriter::new();
    writer.add_record_dimension("time").unwrap();
    writer.add_dimension("y", 2);
    writer.add_dimension("x", 3);
    writer.add_text_attribute("title", "dome test");
    writer
        .add_variable("x1", &["x"], NcType::Double, &[0.0, 2000.0, 4000.0])
        .unwrap();
    writer
        .add_variable(
            "thk",
            &["time", "y", "x"],
            NcType::Float,
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0],
        )
        .unwrap();
    writer
        .add_variable("step", &["time"], NcType::Short, &[10.0, 20.0])
        .unwrap();
    writer
}

#[test]
fn test_interleaved_record_variables() {
    let ds = Dataset::from_bytes(two_record_vars().to_bytes().unwrap()).unwrap();
    assert_eq!(ds.num_records(), 2);
    assert_eq!(ds.dimension("time").unwrap().len, 2);
    assert!(ds.dimension("time").unwrap().is_record);

    let thk = ds.read("thk").unwrap();
    assert_eq!(thk.shape(), &[2, 2, 3]);
    assert_eq!(thk[[1, 0, 2]], 9.0);
    assert_eq!(thk[[0, 1, 0]], 4.0);

    let step = ds.read("step").unwrap();
    assert_eq!(step.iter().copied().collect::<Vec<_>>(), vec![10.0, 20.0]);

    let x1 = ds.read("x1").unwrap();
    assert_eq!(x1.shape(), &[3]);
    assert_eq!(x1[[2]], 4000.0);
}

#[test]
fn test_single_short_record_variable_is_unpadded() {
    let mut writer = ClassicWriter::new();
    writer.add_record_dimension("time").unwrap();
    writer
        .add_variable("flag", &["time"], NcType::Short, &[1.0, -1.0, 3.0])
        .unwrap();
    let bytes = writer.to_bytes().unwrap();

    let ds = Dataset::from_bytes(bytes.clone()).unwrap();
    let flag = ds.read("flag").unwrap();
    assert_eq!(flag.iter().copied().collect::<Vec<_>>(), vec![1.0, -1.0, 3.0]);
    // Three 2-byte records packed back to back.
    assert_eq!(&bytes[bytes.len() - 6..], &[0, 1, 0xFF, 0xFF, 0, 3]);
}

#[test]
fn test_streaming_record_count() {
    let mut bytes = two_record_vars().to_bytes().unwrap();
    bytes[4..8].copy_from_slice(&[0xFF; 4]);
    let ds = Dataset::from_bytes(bytes).unwrap();
    assert_eq!(ds.num_records(), 2);
    assert_eq!(ds.read("thk").unwrap().shape(), &[2, 2, 3]);
}

#[test]
fn test_time_dimension_detection() {
    let ds = Dataset::from_bytes(two_record_vars().to_bytes().unwrap()).unwrap();
    assert!(ds.has_time());

    let mut writer = ClassicWriter::new();
    writer.add_dimension("level", 2);
    writer
        .add_variable("sigma", &["level"], NcType::Double, &[0.0, 1.0])
        .unwrap();
    let ds = Dataset::from_bytes(writer.to_bytes().unwrap()).unwrap();
    assert!(!ds.has_time());
}

#[test]
fn test_global_text_attribute() {
    let ds = Dataset::from_bytes(two_record_vars().to_bytes().unwrap()).unwrap();
    let title = &ds.global_attributes()[0];
    assert_eq!(title.name, "title");
    assert_eq!(title.value, AttrValue::Text("dome test".to_string()));
}

#[test]
fn test_empty_dataset() {
    let ds = Dataset::from_bytes(ClassicWriter::new().to_bytes().unwrap()).unwrap();
    assert!(ds.variables().is_empty());
    assert!(ds.dimensions().is_empty());
    assert_eq!(ds.num_records(), 0);
}

#[test]
fn test_shape_of_missing_variable() {
    let ds = Dataset::from_bytes(two_record_vars().to_bytes().unwrap()).unwrap();
    assert_eq!(ds.shape("thk").unwrap(), vec![2, 2, 3]);
    assert!(matches!(ds.shape("vel"), Err(NetcdfError::NoSuchVariable(_))));
}

#[test]
fn test_write_and_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dome.0000.nc");
    two_record_vars().write(&path).unwrap();

    let ds = Dataset::open(&path).unwrap();
    assert_eq!(ds.format_version(), 1);
    assert!(ds.contains("thk"));
    assert_eq!(ds.variables().len(), 3);
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Dataset::open(dir.path().join("absent.nc")),
        Err(NetcdfError::Io(_))
    ));
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_name(out: &mut Vec<u8>, name: &str) {
    put_u32(out, name.len() as u32);
    out.extend_from_slice(name.as_bytes());
    out.resize(out.len().div_ceil(4) * 4, 0);
}

/// 64-bit offset file: fixed `x1(x)` and record `v(time, x)`, both double,
/// two records, with 8-byte `begin` fields.
fn offset64_file() -> Vec<u8> {
    const DOUBLE: u32 = 6;
    let var_header = |out: &mut Vec<u8>, name: &str, dims: &[u32], vsize: u32, begin: u64| {
        put_name(out, name);
        put_u32(out, dims.len() as u32);
        for &id in dims {
            put_u32(out, id);
        }
        put_u32(out, 0);
        put_u32(out, 0);
        put_u32(out, DOUBLE);
        put_u32(out, vsize);
        out.extend_from_slice(&begin.to_be_bytes());
    };

    let build = |x1_begin: u64, v_begin: u64| {
        let mut out = b"CDF\x02".to_vec();
        put_u32(&mut out, 2);

        put_u32(&mut out, 0x0A);
        put_u32(&mut out, 2);
        put_name(&mut out, "time");
        put_u32(&mut out, 0);
        put_name(&mut out, "x");
        put_u32(&mut out, 3);

        put_u32(&mut out, 0);
        put_u32(&mut out, 0);

        put_u32(&mut out, 0x0B);
        put_u32(&mut out, 2);
        var_header(&mut out, "x1", &[1], 24, x1_begin);
        var_header(&mut out, "v", &[0, 1], 24, v_begin);
        out
    };

    let header_len = build(0, 0).len() as u64;
    let mut out = build(header_len, header_len + 24);
    for value in [0.0f64, 2000.0, 4000.0, 1.5, -2.0, 3.0, 4.5, 5.0, -6.0] {
        out.extend_from_slice(&value.to_be_bytes());
    }
    out
}

#[test]
fn test_64bit_offset_format() {
    let ds = Dataset::from_bytes(offset64_file()).unwrap();
    assert_eq!(ds.format_version(), 2);
    assert_eq!(ds.num_records(), 2);
    assert!(ds.has_time());

    let x1 = ds.read("x1").unwrap();
    assert_eq!(x1.iter().copied().collect::<Vec<_>>(), vec![0.0, 2000.0, 4000.0]);

    let v = ds.read("v").unwrap();
    assert_eq!(v.shape(), &[2, 3]);
    assert_eq!(
        v.iter().copied().collect::<Vec<_>>(),
        vec![1.5, -2.0, 3.0, 4.5, 5.0, -6.0]
    );
}

#[test]
fn test_64bit_offset_streaming_records() {
    let mut bytes = offset64_file();
    bytes[4..8].copy_from_slice(&[0xFF; 4]);
    let ds = Dataset::from_bytes(bytes).unwrap();
    assert_eq!(ds.num_records(), 2);
    assert_eq!(ds.read("v").unwrap()[[1, 2]], -6.0);
}
