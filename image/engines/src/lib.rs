/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the key wrap, key scrambler and image encryption engines
    backed by the external executables.

--*/

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use otfad_image_exec::exec;
use otfad_image_gen::*;
use otfad_image_types::OtfadResult;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default location of an engine executable, relative to the current directory
pub fn default_executable(name: &str) -> PathBuf {
    PathBuf::from(format!(
        "./{name}/{name}{}",
        std::env::consts::EXE_SUFFIX
    ))
}

/// External engine executables
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProcessEngines {
    pub key_wrap: PathBuf,

    pub key_scrambler: PathBuf,

    pub encrypt_image: PathBuf,

    /// Limit for a single engine invocation
    pub timeout: Duration,
}

impl Default for ProcessEngines {
    fn default() -> Self {
        Self {
            key_wrap: default_executable(KEY_WRAP_ENGINE),
            key_scrambler: default_executable(KEY_SCRAMBLER_ENGINE),
            encrypt_image: default_executable(ENCRYPT_IMAGE_ENGINE),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ProcessEngines {
    fn run(&self, engine: &'static str, exe: &Path, args: Vec<OsString>) -> OtfadResult<()> {
        exec(engine, Command::new(exe).args(args), self.timeout)
    }
}

impl KeyWrapper for ProcessEngines {
    fn wrap(&self, req: &KeyWrapRequest) -> OtfadResult<()> {
        self.run(KEY_WRAP_ENGINE, &self.key_wrap, key_wrap_args(req))
    }
}

impl KeyScrambler for ProcessEngines {
    fn scramble(&self, req: &KeyScrambleRequest) -> OtfadResult<()> {
        self.run(
            KEY_SCRAMBLER_ENGINE,
            &self.key_scrambler,
            key_scrambler_args(req),
        )
    }
}

impl Encryptor for ProcessEngines {
    fn encrypt(&self, req: &EncryptRequest) -> OtfadResult<()> {
        self.run(
            ENCRYPT_IMAGE_ENGINE,
            &self.encrypt_image,
            encrypt_image_args(req),
        )
    }
}

fn addr_arg(addr: u64) -> OsString {
    format!("{addr:#x}").into()
}

/// `-i <kek> -k <key> -c <ctr> -s <start> -e <end> [-v] -o <out>`
pub fn key_wrap_args(req: &KeyWrapRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-i".into(),
        req.kek.into(),
        "-k".into(),
        req.enc_key.into(),
        "-c".into(),
        req.counter.into(),
        "-s".into(),
        addr_arg(req.start_addr),
        "-e".into(),
        addr_arg(req.end_addr),
    ];
    if req.valid {
        args.push("-v".into());
    }
    args.push("-o".into());
    args.push(req.output.into());
    args
}

/// `-i <key> -k <seed> -a <XX> -c <context> -o <out>`
pub fn key_scrambler_args(req: &KeyScrambleRequest) -> Vec<OsString> {
    vec![
        "-i".into(),
        req.otfad_key.into(),
        "-k".into(),
        req.key_scramble.into(),
        "-a".into(),
        format!("{:02X}", req.align).into(),
        "-c".into(),
        req.context.to_string().into(),
        "-o".into(),
        req.output.into(),
    ]
}

/// `-i <image> -k <key> -c <ctr> -s <start> -e <end> -o <out>`
pub fn encrypt_image_args(req: &EncryptRequest) -> Vec<OsString> {
    vec![
        "-i".into(),
        req.input_image.into(),
        "-k".into(),
        req.enc_key.into(),
        "-c".into(),
        req.counter.into(),
        "-s".into(),
        addr_arg(req.start_addr),
        "-e".into(),
        addr_arg(req.end_addr),
        "-o".into(),
        req.output.into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use otfad_image_types::{ErrorKind, OtfadError};

    fn strs(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.into_string().unwrap())
            .collect()
    }

    fn wrap_req(valid: bool) -> KeyWrapRequest<'static> {
        KeyWrapRequest {
            kek: Path::new("otfad_key.bin"),
            enc_key: Path::new("key1.bin"),
            counter: Path::new("ctr1.bin"),
            start_addr: 0xC000_1000,
            end_addr: 0xC000_1FFF,
            valid,
            output: Path::new("result/keyblob1"),
        }
    }

    #[test]
    fn test_key_wrap_args() {
        assert_eq!(
            strs(key_wrap_args(&wrap_req(true))),
            [
                "-i",
                "otfad_key.bin",
                "-k",
                "key1.bin",
                "-c",
                "ctr1.bin",
                "-s",
                "0xc0001000",
                "-e",
                "0xc0001fff",
                "-v",
                "-o",
                "result/keyblob1"
            ]
        );
    }

    #[test]
    fn test_dummy_key_wrap_omits_valid_flag() {
        let args = strs(key_wrap_args(&wrap_req(false)));
        assert!(!args.iter().any(|a| a == "-v"));
        assert_eq!(args.len(), 12);
    }

    #[test]
    fn test_key_scrambler_args() {
        let req = KeyScrambleRequest {
            otfad_key: Path::new("otfad_key.bin"),
            key_scramble: Path::new("key_scramble.bin"),
            align: 0x0A,
            context: 3,
            output: Path::new("result/otfad_scrambled_key4"),
        };
        assert_eq!(
            strs(key_scrambler_args(&req)),
            [
                "-i",
                "otfad_key.bin",
                "-k",
                "key_scramble.bin",
                "-a",
                "0A",
                "-c",
                "3",
                "-o",
                "result/otfad_scrambled_key4"
            ]
        );
    }

    #[test]
    fn test_encrypt_image_args() {
        let req = EncryptRequest {
            input_image: Path::new("flash.bin"),
            enc_key: Path::new("key1.bin"),
            counter: Path::new("ctr1.bin"),
            start_addr: 0xC000_1000,
            end_addr: 0xC000_2000,
            output: Path::new("result/enc_image1"),
        };
        assert_eq!(
            strs(encrypt_image_args(&req)),
            [
                "-i",
                "flash.bin",
                "-k",
                "key1.bin",
                "-c",
                "ctr1.bin",
                "-s",
                "0xc0001000",
                "-e",
                "0xc0002000",
                "-o",
                "result/enc_image1"
            ]
        );
    }

    #[test]
    fn test_default_executables() {
        let engines = ProcessEngines::default();
        let expected = format!("./key_wrap/key_wrap{}", std::env::consts::EXE_SUFFIX);
        assert_eq!(engines.key_wrap, PathBuf::from(expected));
        assert_eq!(engines.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_missing_executable() {
        let engines = ProcessEngines {
            key_wrap: PathBuf::from("/tmp/pvoruxpa5dbnjv5sj5t15omn/key_wrap"),
            ..Default::default()
        };
        let err = engines.wrap(&wrap_req(true)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalEngine);
        assert!(matches!(
            err,
            OtfadError::EngineLaunch {
                engine: KEY_WRAP_ENGINE,
                ..
            }
        ));
    }
}
