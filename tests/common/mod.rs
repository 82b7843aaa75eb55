//! Shared fixtures for integration tests.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use coreos_customizer::artifact::cpio::pack_initram;
use coreos_customizer::artifact::squashfs::{build_squashfs, SquashfsOptions};
use std::collections::HashMap;
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

type Routes = Arc<HashMap<String, Vec<u8>>>;

/// HTTP server answering GETs from a fixed route table.
///
/// Unknown paths get a 404. The server runs on its own runtime thread and
/// lives until the test process exits.
pub struct TestServer {
    base: String,
}

impl TestServer {
    pub fn start(routes: HashMap<String, Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let base = format!("http://{}", listener.local_addr().expect("local addr"));
        let app = Router::new()
            .fallback(serve_route)
            .with_state(Arc::new(routes));

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("test server runtime");
            runtime.block_on(async move {
                let listener =
                    tokio::net::TcpListener::from_std(listener).expect("tokio listener");
                axum::serve(listener, app).await.expect("serve");
            });
        });

        Self { base }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

async fn serve_route(State(routes): State<Routes>, uri: Uri) -> Response {
    match routes.get(uri.path()) {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// Build a gzip-compressed initram containing `init` and an embedded
/// `usr.squashfs` with `bin/busybox`, `lib/libc.so` and an empty `share/`.
///
/// Returns the archive path.
pub fn sample_initram(dir: &Path) -> PathBuf {
    let image_src = dir.join("usr-src");
    fs::create_dir_all(image_src.join("bin")).unwrap();
    fs::create_dir_all(image_src.join("lib")).unwrap();
    fs::create_dir_all(image_src.join("share")).unwrap();
    fs::write(image_src.join("bin/busybox"), "busybox").unwrap();
    fs::write(image_src.join("lib/libc.so"), "libc").unwrap();

    let root = dir.join("initram-root");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("init"), "#!/bin/sh\nexec /usr/bin/sh\n").unwrap();
    build_squashfs(&image_src, &root.join("usr.squashfs"), &SquashfsOptions::default()).unwrap();

    let archive = dir.join("example.cpio.gz");
    pack_initram(&root, &archive, 6).unwrap();
    archive
}

/// Initram without an embedded squashfs image.
pub fn initram_without_image(dir: &Path) -> PathBuf {
    let root = dir.join("bare-root");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("init"), "#!/bin/sh\n").unwrap();
    let archive = dir.join("bare.cpio.gz");
    pack_initram(&root, &archive, 6).unwrap();
    archive
}

/// Resource directory with `cloud-config.yml` and `setup.sh`.
pub fn sample_resources(dir: &Path) -> PathBuf {
    let resources = dir.join("addfiles");
    fs::create_dir_all(&resources).unwrap();
    fs::write(resources.join("cloud-config.yml"), "#cloud-config\n").unwrap();
    fs::write(resources.join("setup.sh"), "#!/bin/sh\necho setup\n").unwrap();
    resources
}
