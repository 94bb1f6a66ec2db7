//! End-to-end pipeline test over a pre-seeded download cache. No request
//! leaves the machine: every reachable candidate is already cached, and the
//! one cache miss points at an unroutable port.

use image::{Rgb, RgbImage};
use portra_core::variations;
use portra_core::{
    Candidate, Curator, CuratorConfig, DownloadCache, FaceDetector, FaceError, FaceRegion,
    ImageRecord,
};
use std::collections::HashMap;
use std::path::Path;
use tempfile::tempdir;

/// Reports a generous face on 120x120 images and nothing on anything else.
struct StubDetector;

impl FaceDetector for StubDetector {
    fn detect_faces(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, FaceError> {
        if image.dimensions() == (120, 120) {
            Ok(vec![FaceRegion {
                x: 0,
                y: 0,
                width: 60,
                height: 60,
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

fn record(title: &str, url: &str, year: Option<u32>) -> Candidate {
    Candidate {
        record: ImageRecord {
            title: title.to_owned(),
            page_id: 0,
            url: url.to_owned(),
            thumb_url: None,
            width: 120,
            height: 120,
            thumb_width: None,
            thumb_height: None,
            timestamp: None,
            metadata: HashMap::new(),
        },
        year,
    }
}

fn split_image(bright_right: bool) -> RgbImage {
    RgbImage::from_fn(120, 120, |x, _| {
        if (x >= 60) == bright_right {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

fn seed(cache_dir: &Path, url: &str, image: &RgbImage) {
    let path = cache_dir.join(DownloadCache::cache_key(url));
    variations::save_jpeg(image, &path, 95).unwrap();
}

/// Serves one canned JSON body for every request on a local port.
fn spawn_member_api(body: String) -> String {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{}/api.php", addr)
}

/// Builds a member page payload from (page id, title, url, license) rows.
fn member_page(entries: &[(u32, &str, &str, &str)]) -> String {
    let mut pages = serde_json::Map::new();
    for (page_id, title, url, license) in entries {
        pages.insert(
            page_id.to_string(),
            serde_json::json!({
                "pageid": page_id,
                "title": title,
                "imageinfo": [{
                    "url": url,
                    "extmetadata": {"LicenseShortName": {"value": license}}
                }]
            }),
        );
    }
    serde_json::json!({"query": {"pages": pages}}).to_string()
}

#[test]
fn validation_gauntlet_filters_duplicates_faces_and_failures() {
    let workspace = tempdir().unwrap();
    let output_dir = workspace.path().join("out");
    let cache_dir = workspace.path().join("cache");
    std::fs::create_dir_all(&cache_dir).unwrap();

    let first = split_image(true);
    let distinct = split_image(false);
    let faceless = RgbImage::from_pixel(80, 80, Rgb([128, 128, 128]));

    seed(&cache_dir, "http://127.0.0.1:9/one.jpg", &first);
    seed(&cache_dir, "http://127.0.0.1:9/three.jpg", &first);
    seed(&cache_dir, "http://127.0.0.1:9/four.jpg", &faceless);
    seed(&cache_dir, "http://127.0.0.1:9/five.jpg", &distinct);

    let candidates = vec![
        record("File:One.jpg", "http://127.0.0.1:9/one.jpg", Some(1989)),
        // Same URL as the first candidate: an exact duplicate.
        record("File:Two.jpg", "http://127.0.0.1:9/one.jpg", Some(1990)),
        // Same pixels under a new URL: a near duplicate.
        record("File:Three.jpg", "http://127.0.0.1:9/three.jpg", Some(1991)),
        record("File:Four.jpg", "http://127.0.0.1:9/four.jpg", Some(2005)),
        record("File:Five.jpg", "http://127.0.0.1:9/five.jpg", Some(2017)),
        // Never cached, and the port is unroutable: the download fails.
        record("File:Six.jpg", "http://127.0.0.1:9/six.jpg", Some(2019)),
    ];

    let mut curator = Curator::new(
        CuratorConfig {
            subject: "Donald Trump".to_owned(),
            output_dir: output_dir.clone(),
            cache_dir,
            max_images: 10,
            api_url: None,
        },
        Box::new(StubDetector),
    )
    .unwrap();

    let approved = curator.download_and_validate(candidates);

    let stats = curator.stats();
    assert_eq!(stats.downloaded, 5);
    assert_eq!(stats.duplicate, 2);
    assert_eq!(stats.no_face, 1);
    assert_eq!(stats.passed, 2);
    assert_eq!(approved.len(), 2);
    assert_eq!(curator.log().len(), 2);

    let count_files = |dir: &Path| std::fs::read_dir(dir).unwrap().count();
    assert_eq!(count_files(&curator.dirs().pending_review), 2);
    // Approval belongs to the review step; nothing is pre-placed there.
    assert_eq!(count_files(&curator.dirs().source_images), 0);
    // Rejected candidates never linger in the raw staging directory.
    assert_eq!(count_files(&curator.dirs().raw), 0);

    // Without review approvals the synthesizer has nothing to read.
    assert_eq!(curator.synthesize_variations(&approved), 0);
    assert_eq!(count_files(&curator.dirs().lighting_variations), 0);

    // Approve both survivors the way the review tool does: move the staged
    // files into source_images.
    for asset in &approved {
        std::fs::rename(
            curator.dirs().pending_review.join(&asset.filename),
            curator.dirs().source_images.join(&asset.filename),
        )
        .unwrap();
    }

    // Both survivors seed the variant set: 4 lighting + 3 quality each.
    let variants = curator.synthesize_variations(&approved);
    assert_eq!(variants, 14);
    assert_eq!(count_files(&curator.dirs().lighting_variations), 8);
    assert_eq!(count_files(&curator.dirs().quality_variations), 6);

    curator.write_reports().unwrap();

    let metadata = std::fs::read_to_string(output_dir.join("image_metadata.json")).unwrap();
    let parsed: Vec<portra_core::CuratedAsset> = serde_json::from_str(&metadata).unwrap();
    assert_eq!(parsed.len(), 2);
    assert!(parsed.iter().all(|asset| !asset.is_negative));

    let summary = std::fs::read_to_string(output_dir.join("CURATION_SUMMARY.md")).unwrap();
    assert!(summary.contains("- Target subject: Donald Trump"));
    assert!(summary.contains("- Total curated images: 2"));
}

#[test]
fn curate_target_drives_fetch_filter_sample_and_validation() {
    let workspace = tempdir().unwrap();
    let output_dir = workspace.path().join("out");
    let cache_dir = workspace.path().join("cache");
    std::fs::create_dir_all(&cache_dir).unwrap();

    let portrait = split_image(true);
    let distinct = split_image(false);
    let banded = RgbImage::from_fn(120, 120, |_, y| {
        if y >= 60 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    });
    let faceless = RgbImage::from_pixel(80, 80, Rgb([128, 128, 128]));

    seed(&cache_dir, "http://127.0.0.1:9/a1.jpg", &portrait);
    seed(&cache_dir, "http://127.0.0.1:9/a2.jpg", &portrait);
    seed(&cache_dir, "http://127.0.0.1:9/b1.jpg", &faceless);
    seed(&cache_dir, "http://127.0.0.1:9/b2.jpg", &banded);
    seed(&cache_dir, "http://127.0.0.1:9/c1.jpg", &distinct);
    // c2 is never cached; its download fails at the unroutable port.

    // Twenty category records: six 1980s, six 1990s, two 2000s admissible
    // portraits, four rejected licenses, two blocklisted titles. With a
    // target of 6 over three decade buckets each bucket contributes its
    // first two members.
    let body = member_page(&[
        (101, "File:Studio portrait 1983 A.jpg", "http://127.0.0.1:9/a1.jpg", "Public Domain"),
        // Same pixels as page 101 under a fresh URL: a near duplicate.
        (102, "File:Studio portrait 1984 B.jpg", "http://127.0.0.1:9/a2.jpg", "Public Domain"),
        (103, "File:Studio portrait 1985 C.jpg", "http://127.0.0.1:9/x1.jpg", "CC BY-SA 4.0"),
        (104, "File:Studio portrait 1986 D.jpg", "http://127.0.0.1:9/x2.jpg", "Public Domain"),
        (105, "File:Studio portrait 1987 E.jpg", "http://127.0.0.1:9/x3.jpg", "Public Domain"),
        (106, "File:Studio portrait 1988 F.jpg", "http://127.0.0.1:9/x4.jpg", "Public Domain"),
        (107, "File:Studio portrait 1992 G.jpg", "http://127.0.0.1:9/b1.jpg", "Public Domain"),
        (108, "File:Studio portrait 1993 H.jpg", "http://127.0.0.1:9/b2.jpg", "Public Domain"),
        (109, "File:Studio portrait 1994 I.jpg", "http://127.0.0.1:9/x5.jpg", "Public Domain"),
        (110, "File:Studio portrait 1995 J.jpg", "http://127.0.0.1:9/x6.jpg", "Public Domain"),
        (111, "File:Studio portrait 1996 K.jpg", "http://127.0.0.1:9/x7.jpg", "Public Domain"),
        (112, "File:Studio portrait 1997 L.jpg", "http://127.0.0.1:9/x8.jpg", "Public Domain"),
        (113, "File:Studio portrait 2003 M.jpg", "http://127.0.0.1:9/c1.jpg", "Public Domain"),
        (114, "File:Studio portrait 2004 N.jpg", "http://127.0.0.1:9/c2.jpg", "Public Domain"),
        (115, "File:Studio portrait 1989 O.jpg", "http://127.0.0.1:9/x9.jpg", "All rights reserved"),
        (116, "File:Studio portrait 1998 P.jpg", "http://127.0.0.1:9/xa.jpg", "All rights reserved"),
        (117, "File:Studio portrait 2005 Q.jpg", "http://127.0.0.1:9/xb.jpg", "Fair use"),
        (118, "File:Studio portrait 2006 R.jpg", "http://127.0.0.1:9/xc.jpg", ""),
        (119, "File:Trump with supporters 1999.jpg", "http://127.0.0.1:9/xd.jpg", "Public Domain"),
        (120, "File:Rally crowd and stage 2001.jpg", "http://127.0.0.1:9/xe.jpg", "Public Domain"),
    ]);
    let api_url = spawn_member_api(body);

    let mut curator = Curator::new(
        CuratorConfig {
            subject: "Donald Trump".to_owned(),
            output_dir,
            cache_dir,
            max_images: 6,
            api_url: Some(api_url),
        },
        Box::new(StubDetector),
    )
    .unwrap();

    let approved = curator.curate_target();

    let stats = curator.stats();
    assert_eq!(stats.non_portrait, 2);
    assert_eq!(stats.downloaded, 5);
    assert_eq!(stats.duplicate, 1);
    assert_eq!(stats.no_face, 1);
    assert_eq!(stats.passed, 3);

    // One approved image per decade, earliest first, years from the titles.
    let years: Vec<Option<u32>> = approved.iter().map(|asset| asset.year).collect();
    assert_eq!(years, vec![Some(1983), Some(1993), Some(2003)]);
    assert!(approved.iter().all(|asset| asset.license == "Public Domain"));

    let count_files = |dir: &Path| std::fs::read_dir(dir).unwrap().count();
    assert_eq!(count_files(&curator.dirs().pending_review), 3);
    assert_eq!(count_files(&curator.dirs().raw), 0);
}
