use fpktool::prelude::*;
use tempfile::tempdir;

fn populate(dir: &std::path::Path, files: &[(&str, Vec<u8>)]) {
    for (name, contents) in files {
        std::fs::write(dir.join(name), contents).unwrap();
    }
}

#[test]
fn test_pack_list_extract_roundtrip() {
    let files = vec![
        ("level01.map", b"tile tile tile tile tile tile".repeat(40)),
        ("sprites.tex", (0u8..=255).cycle().take(5000).collect()),
        ("readme.txt", b"short".to_vec()),
    ];
    let input = tempdir().unwrap();
    populate(input.path(), &files);

    let work = tempdir().unwrap();
    let archive = work.path().join("game.fpk");
    let options = PackOptions {
        key: 0xCAFEBABE,
        ..PackOptions::default()
    };
    pack_fpk(input.path(), &archive, options, None).unwrap();

    let mut names: Vec<String> = list_fpk(&archive)
        .unwrap()
        .into_iter()
        .map(|entry| entry.filename)
        .collect();
    names.sort();
    assert_eq!(names, ["level01.map", "readme.txt", "sprites.tex"]);

    let out = work.path().join("extracted");
    extract_fpk(&archive, &out, &ExtractOptions::default(), None).unwrap();
    for (name, contents) in &files {
        assert_eq!(&std::fs::read(out.join(name)).unwrap(), contents);
    }
}

#[test]
fn test_sequential_and_pipelined_archives_agree() {
    let input = tempdir().unwrap();
    populate(
        input.path(),
        &[
            ("a.bin", b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec()),
            ("b.bin", b"the quick brown fox".repeat(30)),
        ],
    );

    let work = tempdir().unwrap();
    let sequential = work.path().join("seq.fpk");
    let pipelined = work.path().join("par.fpk");
    pack_fpk(
        input.path(),
        &sequential,
        PackOptions {
            threads: 1,
            key: 7,
            ..PackOptions::default()
        },
        None,
    )
    .unwrap();
    pack_fpk(
        input.path(),
        &pipelined,
        PackOptions {
            threads: 4,
            key: 7,
            ..PackOptions::default()
        },
        None,
    )
    .unwrap();

    // payload order may differ, but both must decode to the same files
    for archive in [&sequential, &pipelined] {
        let mut reader = FpkReader::open(archive).unwrap();
        assert_eq!(
            reader.read_file("a.bin").unwrap().unwrap(),
            b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
        assert_eq!(
            reader.read_file("b.bin").unwrap().unwrap(),
            b"the quick brown fox".repeat(30)
        );
    }
}

#[test]
fn test_stored_archive_roundtrip() {
    let input = tempdir().unwrap();
    populate(input.path(), &[("raw.dat", vec![0x42; 1000])]);

    let work = tempdir().unwrap();
    let archive = work.path().join("stored.fpk");
    pack_fpk(
        input.path(),
        &archive,
        PackOptions {
            threads: 1,
            zlc: false,
            ..PackOptions::default()
        },
        None,
    )
    .unwrap();

    let entries = list_fpk(&archive).unwrap();
    assert_eq!(entries[0].length, 1000);

    let mut reader = FpkReader::open(&archive).unwrap();
    assert_eq!(reader.read_file("raw.dat").unwrap().unwrap(), vec![0x42; 1000]);
}

#[test]
fn test_v3_archive_roundtrip() {
    let long_name = "a-filename-well-past-the-twenty-three-byte-legacy-limit.dat";
    let input = tempdir().unwrap();
    populate(input.path(), &[(long_name, b"payload".to_vec())]);

    let work = tempdir().unwrap();
    let archive = work.path().join("v3.fpk");
    pack_fpk(
        input.path(),
        &archive,
        PackOptions {
            threads: 1,
            version: FpkVersion::V3,
            ..PackOptions::default()
        },
        None,
    )
    .unwrap();

    let out = work.path().join("out");
    let options = ExtractOptions {
        threads: 1,
        version: FpkVersion::V3,
        ..ExtractOptions::default()
    };
    extract_fpk(&archive, &out, &options, None).unwrap();
    assert_eq!(std::fs::read(out.join(long_name)).unwrap(), b"payload");
}

#[test]
fn test_pipeline_compresses_through_public_api() {
    use std::sync::Arc;

    let payload = b"repetition repetition repetition".repeat(64);
    let mut pipeline = CompressionPipeline::new(
        Arc::new(FpkPayloadCodec::new()),
        &PipelineConfig::default(),
    );
    pipeline.start(Direction::Compress).unwrap();
    pipeline.submit(Task::new("buffer", payload.clone()));
    let compressed = pipeline.take();
    assert!(compressed.payload.len() < payload.len());
    pipeline.stop_and_wait();

    pipeline.start(Direction::Decompress).unwrap();
    pipeline.submit(compressed);
    assert_eq!(pipeline.take().payload, payload);
    pipeline.stop_and_wait();
}
