//! Shared fixtures for packaging tests: a scripted command runner, an
//! in-memory runtime distribution and a throwaway application workspace.

#![allow(dead_code)]

use flate2::{Compression, write::GzEncoder};
use kodegen_bundler_sea::packager::binary::sentinel_fuse;
use kodegen_bundler_sea::packager::{
    ArchiveSource, ArchiveStream, CommandOutput, CommandRunner, Error, Invocation, PlatformTarget,
    Result, SettingsBuilder,
};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const RUNTIME_VERSION: &str = "22.3.0";
pub const DIST_URL: &str = "https://dist.example.test/runtime";
pub const APP_SOURCE: &str = "console.log('hello from tool');\n";
pub const BLOB_MAGIC: &[u8] = b"FAKESEA\0";

/// Marks a resource attached by the fake `postject`.
pub const RESOURCE_MARKER: &[u8] = b"\0FAKE_RESOURCE\0";

/// Scripted stand-in for esbuild, node, postject and rcodesign.
///
/// - the bundler copies the entrypoint to `--outfile` behind a marker line
/// - `node --version` reports [`RUNTIME_VERSION`]
/// - `node --experimental-sea-config` writes a blob that concatenates the
///   main module and every asset (key followed by contents)
/// - `postject` flips the fuse named by `--sentinel-fuse` and appends the
///   blob as a resource readable with [`attached_resource`]
/// - `rcodesign` exits with `signing_exit`
pub struct FakeRunner {
    pub bundler_exit: i32,
    pub postject_exit: i32,
    pub signing_exit: i32,
    pub signing_installed: bool,
    pub calls: Mutex<Vec<Invocation>>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self {
            bundler_exit: 0,
            postject_exit: 0,
            signing_exit: 0,
            signing_installed: true,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRunner {
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(Invocation::display)
            .collect()
    }

    pub fn calls_to(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.program() == program)
            .count()
    }
}

fn exited(code: i32, stdout: impl Into<String>) -> Result<CommandOutput> {
    Ok(CommandOutput {
        stdout: stdout.into(),
        stderr: String::new(),
        code: Some(code),
    })
}

/// Blob the fake runtime produces for a main module and its assets.
pub fn fake_blob(main: &[u8], assets: &[(&str, &[u8])]) -> Vec<u8> {
    let mut blob = BLOB_MAGIC.to_vec();
    blob.extend_from_slice(main);
    for (key, contents) in assets {
        blob.extend_from_slice(key.as_bytes());
        blob.extend_from_slice(contents);
    }
    blob
}

/// Resource attached by the fake `postject`: its name, Mach-O segment (empty
/// when none was given) and contents.
pub fn attached_resource(bytes: &[u8]) -> Option<(String, String, Vec<u8>)> {
    let start = bytes
        .windows(RESOURCE_MARKER.len())
        .rposition(|w| w == RESOURCE_MARKER)?
        + RESOURCE_MARKER.len();
    let mut fields = bytes[start..].splitn(3, |b| *b == 0);
    let name = String::from_utf8(fields.next()?.to_vec()).ok()?;
    let segment = String::from_utf8(fields.next()?.to_vec()).ok()?;
    let rest = fields.next()?;
    let len = u64::from_le_bytes(rest.get(..8)?.try_into().ok()?) as usize;
    Some((name, segment, rest.get(8..8 + len)?.to_vec()))
}

fn fake_postject(args: &[String]) {
    let binary = Path::new(&args[0]);
    let blob = std::fs::read(&args[2]).unwrap();
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .map(|i| args[i + 1].clone())
    };
    let fuse = format!("{}:0", flag("--sentinel-fuse").expect("no --sentinel-fuse"));
    let segment = flag("--macho-segment-name").unwrap_or_default();

    let mut bytes = std::fs::read(binary).unwrap();
    let at = bytes
        .windows(fuse.len())
        .position(|w| w == fuse.as_bytes())
        .expect("fuse missing from binary");
    bytes[at + fuse.len() - 1] = b'1';
    bytes.extend_from_slice(RESOURCE_MARKER);
    bytes.extend_from_slice(args[1].as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(segment.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(&(blob.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&blob);
    std::fs::write(binary, bytes).unwrap();
}

/// What the fake bundler writes for an entrypoint's source.
pub fn fake_bundle(source: &[u8]) -> Vec<u8> {
    let mut bundle = b"// bundled\n".to_vec();
    bundle.extend_from_slice(source);
    bundle
}

impl CommandRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let args: Vec<String> = invocation
            .args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        match invocation.program() {
            "esbuild" => {
                if self.bundler_exit != 0 {
                    return exited(self.bundler_exit, "");
                }
                let outfile = args
                    .iter()
                    .find_map(|a| a.strip_prefix("--outfile="))
                    .expect("bundler called without --outfile");
                let source = std::fs::read(&args[0]).unwrap();
                std::fs::write(outfile, fake_bundle(&source)).unwrap();
                exited(0, "")
            }
            "node" if args.first().is_some_and(|a| a == "--version") => {
                exited(0, format!("v{RUNTIME_VERSION}\n"))
            }
            "node" => {
                assert_eq!(args[0], "--experimental-sea-config");
                let config: serde_json::Value =
                    serde_json::from_slice(&std::fs::read(&args[1]).unwrap()).unwrap();
                let main = std::fs::read(config["main"].as_str().unwrap()).unwrap();

                let mut assets = Vec::new();
                if let Some(map) = config["assets"].as_object() {
                    for (key, path) in map {
                        assets.push((key.clone(), std::fs::read(path.as_str().unwrap()).unwrap()));
                    }
                }
                let borrowed: Vec<(&str, &[u8])> = assets
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_slice()))
                    .collect();
                std::fs::write(
                    config["output"].as_str().unwrap(),
                    fake_blob(&main, &borrowed),
                )
                .unwrap();
                exited(0, "")
            }
            "postject" => {
                if self.postject_exit != 0 {
                    return exited(self.postject_exit, "");
                }
                fake_postject(&args);
                exited(0, "")
            }
            "rcodesign" => exited(self.signing_exit, ""),
            other => panic!("unexpected program {other}"),
        }
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        (program != "rcodesign" || self.signing_installed)
            .then(|| PathBuf::from("/opt/fake/bin").join(program))
    }
}

/// Serves runtime archives from memory, keyed by archive file name.
pub struct FakeSource {
    archives: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl FakeSource {
    /// Linux, macOS and Windows runtimes for [`RUNTIME_VERSION`].
    pub fn standard() -> Arc<Self> {
        let v = RUNTIME_VERSION;
        let mut archives = HashMap::new();
        archives.insert(
            format!("node-v{v}-linux-x64.tar.gz"),
            tar_gz(&format!("node-v{v}-linux-x64/bin/node"), &elf_runtime()),
        );
        archives.insert(
            format!("node-v{v}-darwin-arm64.tar.gz"),
            tar_gz(
                &format!("node-v{v}-darwin-arm64/bin/node"),
                &macho_runtime(true),
            ),
        );
        archives.insert(
            format!("node-v{v}-win-x64.zip"),
            zip(&format!("node-v{v}-win-x64/node.exe"), &pe_runtime(true)),
        );
        Arc::new(Self {
            archives,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl ArchiveSource for FakeSource {
    async fn open(&self, url: &str) -> Result<ArchiveStream> {
        self.requests.lock().unwrap().push(url.to_string());
        let file_name = url.rsplit('/').next().unwrap_or_default();
        match self.archives.get(file_name) {
            Some(body) => Ok(Box::pin(Cursor::new(body.clone()))),
            None => Err(Error::Fetch {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

pub fn tar_gz(member: &str, data: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append_data(&mut header, member, data).unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn zip(member: &str, data: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(member, zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(data).unwrap();
    writer.finish().unwrap().into_inner()
}

/// Bytes carrying one unused fuse, padded on both sides.
fn fused_section() -> Vec<u8> {
    let mut section = vec![0x90u8; 32];
    section.extend_from_slice(format!("{}:0", sentinel_fuse()).as_bytes());
    section.extend_from_slice(&[0x90; 32]);
    section
}

pub fn elf_runtime() -> Vec<u8> {
    let mut image = b"\x7fELF\x02\x01\x01\0".to_vec();
    image.resize(64, 0);
    image.extend_from_slice(&fused_section());
    image
}

/// Thin arm64 Mach-O executable whose `__LINKEDIT` holds the fuse and,
/// optionally, a trailing code signature.
pub fn macho_runtime(signed: bool) -> Vec<u8> {
    const LINKEDIT_OFF: usize = 0x100;
    let linkedit = fused_section();
    let signature = [0xfau8; 64];

    let sig_off = (LINKEDIT_OFF + linkedit.len()).next_multiple_of(16);
    let end = if signed {
        sig_off + signature.len()
    } else {
        LINKEDIT_OFF + linkedit.len()
    };
    let mut out = vec![0u8; end];
    let put32 = |out: &mut Vec<u8>, at: usize, v: u32| {
        out[at..at + 4].copy_from_slice(&v.to_le_bytes())
    };
    let put64 = |out: &mut Vec<u8>, at: usize, v: u64| {
        out[at..at + 8].copy_from_slice(&v.to_le_bytes())
    };

    put32(&mut out, 0, 0xfeed_facf);
    put32(&mut out, 4, 0x0100_000c);
    put32(&mut out, 12, 2);
    put32(&mut out, 16, if signed { 2 } else { 1 });
    put32(&mut out, 20, if signed { 88 } else { 72 });

    put32(&mut out, 32, 0x19);
    put32(&mut out, 36, 72);
    out[40..50].copy_from_slice(b"__LINKEDIT");
    put64(&mut out, 56, 0x1_0000_0000);
    put64(&mut out, 64, 0x4000);
    put64(&mut out, 72, LINKEDIT_OFF as u64);
    put64(&mut out, 80, (end - LINKEDIT_OFF) as u64);
    put32(&mut out, 88, 1);
    put32(&mut out, 92, 1);

    if signed {
        put32(&mut out, 104, 0x1d);
        put32(&mut out, 108, 16);
        put32(&mut out, 112, sig_off as u32);
        put32(&mut out, 116, signature.len() as u32);
        out[sig_off..].copy_from_slice(&signature);
    }
    out[LINKEDIT_OFF..LINKEDIT_OFF + linkedit.len()].copy_from_slice(&linkedit);
    out
}

/// PE32+ image holding the fuse and, optionally, a trailing certificate
/// table.
pub fn pe_runtime(signed: bool) -> Vec<u8> {
    const BODY: usize = 0x200;
    let body = fused_section();
    let mut pe = vec![0u8; (BODY + body.len()).next_multiple_of(8)];
    pe[0..2].copy_from_slice(b"MZ");
    pe[0x3c..0x40].copy_from_slice(&0x40u32.to_le_bytes());
    pe[0x40..0x44].copy_from_slice(b"PE\0\0");
    pe[0x44..0x46].copy_from_slice(&0x8664u16.to_le_bytes());
    pe[0x54..0x56].copy_from_slice(&240u16.to_le_bytes());
    pe[0x58..0x5a].copy_from_slice(&0x20bu16.to_le_bytes());
    pe[0x58 + 108..0x58 + 112].copy_from_slice(&16u32.to_le_bytes());
    pe[BODY..BODY + body.len()].copy_from_slice(&body);
    if signed {
        let cert_off = pe.len() as u32;
        let dir = 0x58 + 112 + 32;
        pe[dir..dir + 4].copy_from_slice(&cert_off.to_le_bytes());
        pe[dir + 4..dir + 8].copy_from_slice(&0x40u32.to_le_bytes());
        let mut cert = [0xab; 0x40];
        cert[0..4].copy_from_slice(&0x40u32.to_le_bytes());
        cert[4..8].copy_from_slice(&[0x00, 0x02, 0x02, 0x00]);
        pe.extend_from_slice(&cert);
    }
    pe
}

/// A package directory plus output and cache directories, all temporary.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Creates `app/` holding `{"name": "tool", "version": "1.2.0", "main": "index.js"}`.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(
            app.join("package.json"),
            r#"{"name": "tool", "version": "1.2.0", "main": "index.js"}"#,
        )
        .unwrap();
        std::fs::write(app.join("index.js"), APP_SOURCE).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn app(&self) -> PathBuf {
        self.dir.path().join("app")
    }

    pub fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn cache(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Settings pointing at this workspace and the fake distribution.
    pub fn settings(&self, platforms: &[&str]) -> SettingsBuilder {
        SettingsBuilder::new()
            .entrypoint(self.app())
            .runtime_version(RUNTIME_VERSION)
            .platforms(platforms.iter().map(|p| PlatformTarget::parse(p)).collect())
            .output_dir(self.out())
            .cache_dir(self.cache())
            .dist_url(DIST_URL)
    }
}
