// Licensed under the Apache-2.0 license

use std::path::{Path, PathBuf};

use otfad_image_exec::fs::TempDir;
use otfad_image_gen::fake::{FakeCall, FakeEngines};
use otfad_image_gen::*;
use otfad_image_types::*;

struct Fixture {
    dir: TempDir,
    config: ImageGeneratorConfig,
    work_dir: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let otfad_key: Vec<u8> = (0u8..16).collect();
        let image: Vec<u8> = (0..0x6000u32).map(|i| (i % 251) as u8).collect();
        let config = ImageGeneratorConfig {
            otfad_key: dir.write("otfad_key.bin", otfad_key).unwrap(),
            input_image: dir.write("flash.bin", image).unwrap(),
            key_scramble: None,
        };
        for n in 1u8..=4 {
            dir.write(&format!("key{n}.bin"), [n; 16]).unwrap();
            dir.write(&format!("ctr{n}.bin"), [n; 8]).unwrap();
        }
        let work_dir = dir.path().join("result");
        std::fs::create_dir(&work_dir).unwrap();
        Self {
            dir,
            config,
            work_dir,
        }
    }

    fn params(&self, n: u8, offset: u64, size: u64) -> PartitionParams {
        PartitionParams {
            image_offset: Some(offset),
            size: Some(size),
            image_enc_key: Some(self.dir.path().join(format!("key{n}.bin"))),
            counter: Some(self.dir.path().join(format!("ctr{n}.bin"))),
        }
    }

    fn layout(&self, parts: &[(u64, u64)]) -> ValidatedLayout {
        let mut params: [PartitionParams; PARTITION_COUNT] = Default::default();
        for (idx, &(offset, size)) in parts.iter().enumerate() {
            params[idx] = self.params(idx as u8 + 1, offset, size);
        }
        let table = PartitionTable::new(&params, QSPI_BASE_ADDR, &self.work_dir).unwrap();
        layout::validate(table, 0x6000).unwrap()
    }

    fn header(&self) -> PathBuf {
        self.dir.path().join("header")
    }

    fn key(&self, n: u8) -> PathBuf {
        self.dir.path().join(format!("key{n}.bin"))
    }
}

fn len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

#[test]
fn test_generate_two_partitions() {
    let fx = Fixture::new();
    let layout = fx.layout(&[(0x1000, 0x1000), (0x2000, 0x800)]);
    let engines = FakeEngines::new().with_header(fx.header());
    let gen = ImageGenerator::new(&engines, &engines, &engines);

    gen.generate(&fx.config, &layout).unwrap();

    let table = layout.table();
    let kb = |slot: u8| table.get(slot).unwrap().artifacts().keyblob.clone();
    let enc = |slot: u8| table.get(slot).unwrap().artifacts().enc_image.clone();
    assert_eq!(
        engines.calls(),
        vec![
            FakeCall::Wrap {
                kek: fx.config.otfad_key.clone(),
                enc_key: fx.key(1),
                start_addr: 0xC000_1000,
                end_addr: 0xC000_1FFF,
                valid: true,
                output: kb(1),
            },
            FakeCall::Encrypt {
                start_addr: 0xC000_1000,
                end_addr: 0xC000_2000,
                output: enc(1),
            },
            FakeCall::Wrap {
                kek: fx.config.otfad_key.clone(),
                enc_key: fx.key(2),
                start_addr: 0xC000_2000,
                end_addr: 0xC000_2800,
                valid: true,
                output: kb(2),
            },
            FakeCall::Encrypt {
                start_addr: 0xC000_2000,
                end_addr: 0xC000_2800,
                output: enc(2),
            },
            FakeCall::Wrap {
                kek: fx.config.otfad_key.clone(),
                enc_key: fx.key(1),
                start_addr: 0xC000_1000,
                end_addr: 0xC000_1FFF,
                valid: false,
                output: kb(3),
            },
            FakeCall::Wrap {
                kek: fx.config.otfad_key.clone(),
                enc_key: fx.key(1),
                start_addr: 0xC000_1000,
                end_addr: 0xC000_1FFF,
                valid: false,
                output: kb(4),
            },
        ]
    );

    for slot in 1..=4 {
        assert_eq!(len(&kb(slot)), KEY_BLOB_BYTE_SIZE as u64);
    }
    assert_eq!(len(&enc(1)), 0x1000);
    assert_eq!(len(&enc(2)), 0x800);
    assert_eq!(len(&enc(3)), 0);
    assert_eq!(len(&enc(4)), 0);
    assert_eq!(len(&fx.header()), BOOT_HEADER_BYTE_SIZE as u64);
}

#[test]
fn test_generate_with_key_scramble() {
    let mut fx = Fixture::new();
    fx.config.key_scramble = Some(KeyScrambleConfig {
        seed: fx.dir.write("key_scramble.bin", [0xDEu8, 0xAD, 0xBE, 0xEF]).unwrap(),
        align: 0x07,
    });
    let layout = fx.layout(&[(0x1000, 0x1000)]);
    let engines = FakeEngines::new();
    let gen = ImageGenerator::new(&engines, &engines, &engines);

    gen.generate(&fx.config, &layout).unwrap();

    let calls = engines.calls();
    let contexts: Vec<u8> = calls
        .iter()
        .filter_map(|c| match c {
            FakeCall::Scramble { context, align, .. } => {
                assert_eq!(*align, 0x07);
                Some(*context)
            }
            _ => None,
        })
        .collect();
    assert_eq!(contexts, [0, 1, 2, 3]);

    // Each key blob is wrapped with its own context's scrambled key
    for p in layout.table().iter() {
        let scrambled = &p.artifacts().scrambled_key;
        assert_eq!(len(scrambled), OTFAD_KEY_BYTE_SIZE as u64);
        assert!(calls.iter().any(|c| matches!(
            c,
            FakeCall::Wrap { kek, output, .. }
                if kek == scrambled && output == &p.artifacts().keyblob
        )));
    }
    let first = std::fs::read(&layout.table().partitions()[0].artifacts().scrambled_key).unwrap();
    let second = std::fs::read(&layout.table().partitions()[1].artifacts().scrambled_key).unwrap();
    assert_ne!(first, second);
}

#[test]
fn test_engine_failure_stops_generation() {
    let fx = Fixture::new();
    let layout = fx.layout(&[(0x1000, 0x1000), (0x2000, 0x800)]);
    let engines = FakeEngines::new().failing(ENCRYPT_IMAGE_ENGINE);
    let gen = ImageGenerator::new(&engines, &engines, &engines);

    let err = gen.generate(&fx.config, &layout).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalEngine);
    assert!(err.to_string().starts_with("encrypt_image"));

    // Only the first key blob was produced
    assert_eq!(engines.calls().len(), 1);
    assert!(!layout.table().partitions()[1].artifacts().keyblob.exists());
}

#[test]
fn test_short_engine_output_rejected() {
    struct ShortWrap;
    impl KeyWrapper for ShortWrap {
        fn wrap(&self, req: &KeyWrapRequest) -> OtfadResult<()> {
            std::fs::write(req.output, [0u8; 48]).unwrap();
            Ok(())
        }
    }

    let fx = Fixture::new();
    let layout = fx.layout(&[(0x1000, 0x1000)]);
    let engines = FakeEngines::new();
    let gen = ImageGenerator::new(ShortWrap, &engines, &engines);

    let err = gen.generate(&fx.config, &layout).unwrap_err();
    match err {
        OtfadError::EngineOutput {
            engine,
            expected,
            actual,
            ..
        } => {
            assert_eq!(engine, KEY_WRAP_ENGINE);
            assert_eq!(expected, 64);
            assert_eq!(actual, 48);
        }
        err => panic!("unexpected error {err}"),
    }
}
