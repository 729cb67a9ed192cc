use async_compression::tokio::bufread::GzipEncoder;
use bytes::Bytes;
use hyper::StatusCode;
use ocs_dav_rs::webdav::props;
use ocs_dav_rs::{
    ClientError, DavPathVariant, Depth, FileType, FilterRules, ServerVersion, Session,
    WebDavClient,
};
use tokio::io::AsyncReadExt;

use crate::util::{
    MockResponse, MockServer, file_entry, folder_entry, multistatus, sabre_error,
};

async fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzipEncoder::new(data);
    let mut out = Vec::new();
    encoder.read_to_end(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn lists_a_folder_on_the_legacy_endpoint() {
    let server = MockServer::start(|_| {
        MockResponse::multistatus(&multistatus(&[
            folder_entry("/remote.php/webdav/Documents/"),
            file_entry("/remote.php/webdav/Documents/Notes%20%231.md", 42, "101"),
            file_entry("/elsewhere/ignored.txt", 1, "1"),
            file_entry("/remote.php/webdav/Documents/%C3%A9t%C3%A9.odt", 7, "102"),
        ]))
    })
    .await;
    let client = WebDavClient::new(server.session()).unwrap();

    let files = client.list("/Documents", Depth::One, &[]).await.unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["/Documents", "/Documents/Notes #1.md", "/Documents/été.odt"]);
    assert_eq!(files[0].file_type(), FileType::Dir);
    assert_eq!(files[0].etag(), Some("\"dir\""));
    assert_eq!(files[1].size(), Some(42));
    assert_eq!(files[1].file_id(), Some("101"));

    let req = server.last_request();
    assert_eq!(req.method, "PROPFIND");
    assert_eq!(req.path(), "/remote.php/webdav/Documents");
    assert_eq!(req.header("depth"), Some("1"));
    assert_eq!(req.header("authorization"), Some("Basic YWxpY2U6c2VjcmV0"));
    assert!(req.header("content-type").unwrap().starts_with("application/xml"));
    assert!(req.header("accept-encoding").is_some());
    assert!(req.body.contains("<d:propfind"));
    assert!(req.body.contains("<oc:fileid/>"));
}

#[tokio::test]
async fn version_ten_sessions_use_the_files_endpoint() {
    let server = MockServer::start(|_| {
        MockResponse::multistatus(&multistatus(&[
            folder_entry("/remote.php/dav/files/alice/"),
            file_entry("/remote.php/dav/files/alice/Photos/cat.jpg", 2048, "7"),
        ]))
    })
    .await;
    let session = server.session().with_version(ServerVersion::new(10, 13, 4));
    assert_eq!(session.dav_variant(), DavPathVariant::Dav);
    let client = WebDavClient::new(session).unwrap();

    let files = client.list("/", Depth::One, &[props::GETETAG]).await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].name(), "/");
    assert!(files[0].is_dir());
    assert_eq!(files[1].name(), "/Photos/cat.jpg");
    assert_eq!(files[1].base_name(), "cat.jpg");

    let req = server.last_request();
    assert_eq!(req.path(), "/remote.php/dav/files/alice/");
    assert!(req.body.contains("<d:prop><d:getetag/></d:prop>"));
}

#[tokio::test]
async fn file_info_reports_missing_resources() {
    let server = MockServer::start(|req| {
        if req.path().ends_with("present.txt") {
            MockResponse::multistatus(&multistatus(&[file_entry(
                "/remote.php/webdav/present.txt",
                3,
                "9",
            )]))
        } else {
            MockResponse::new(
                404,
                sabre_error(
                    "Sabre\\DAV\\Exception\\NotFound",
                    "File with name //missing.txt could not be located",
                ),
            )
        }
    })
    .await;
    let client = WebDavClient::new(server.session()).unwrap();

    let info = client.file_info("present.txt", &[]).await.unwrap();
    assert_eq!(info.name(), "/present.txt");
    assert_eq!(server.last_request().header("depth"), Some("0"));

    let err = client.file_info("/missing.txt", &[]).await.unwrap_err();
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::UnexpectedStatus { status, message }) => {
            assert_eq!(*status, StatusCode::NOT_FOUND);
            assert_eq!(
                message.as_deref(),
                Some("File with name //missing.txt could not be located")
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn file_info_with_only_failed_propstats_is_not_found() {
    let server = MockServer::start(|_| {
        MockResponse::multistatus(&multistatus(&[r#"<d:response><d:href>/remote.php/webdav/locked</d:href><d:propstat><d:prop><d:getetag/></d:prop><d:status>HTTP/1.1 403 Forbidden</d:status></d:propstat></d:response>"#.to_string()]))
    })
    .await;
    let client = WebDavClient::new(server.session()).unwrap();

    let err = client.file_info("locked", &[]).await.unwrap_err();
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::NotFound { path }) => assert_eq!(path, "/locked"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_listings_are_invalid_bodies() {
    const MAINTENANCE: &str = "<html><body><p>Maintenance mode</p></body></html>";
    let truncated = multistatus(&[
        folder_entry("/remote.php/webdav/docs/"),
        file_entry("/remote.php/webdav/docs/a.txt", 1, "1"),
    ]);
    let truncated = truncated[..truncated.find("a.txt").unwrap()].to_string();
    let cut = truncated.clone();

    let server = MockServer::start(move |req| {
        if req.path().ends_with("/docs") {
            MockResponse::multistatus(&cut)
        } else {
            MockResponse::new(207, MAINTENANCE).with_header("Content-Type", "text/html")
        }
    })
    .await;
    let client = WebDavClient::new(server.session()).unwrap();

    let err = client.list("/", Depth::One, &[]).await.unwrap_err();
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::InvalidResponseBody { body }) => assert_eq!(body, MAINTENANCE),
        other => panic!("unexpected error: {other:?}"),
    }

    let err = client.file_info("/plain.txt", &[]).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::InvalidResponseBody { .. })
    ));

    let err = client.list("/docs", Depth::One, &[]).await.unwrap_err();
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::InvalidResponseBody { body }) => assert_eq!(body, &truncated),
        other => panic!("unexpected error: {other:?}"),
    }

    let mut streamed = Vec::new();
    let result = client
        .list_stream("/docs", Depth::One, &[], |info| {
            streamed.push(info.name().to_string());
            Ok(())
        })
        .await;
    assert!(result.is_err());
    assert_eq!(streamed, vec!["/docs"]);
}

#[tokio::test]
async fn file_info_many_keeps_input_order() {
    let server = MockServer::start(|req| {
        let name = req.path().rsplit('/').next().unwrap_or_default().to_string();
        if name == "b.txt" {
            return MockResponse::new(404, sabre_error("NotFound", "gone"));
        }
        MockResponse::multistatus(&multistatus(&[file_entry(
            &format!("/remote.php/webdav/{name}"),
            1,
            "1",
        )]))
    })
    .await;
    let client = WebDavClient::new(server.session()).unwrap();

    let paths = ["a.txt", "b.txt", "c.txt", "d.txt"].map(String::from);
    let results = client.file_info_many(paths, &[], 2).await;
    let order: Vec<&str> = results.iter().map(|r| r.pub_path.as_str()).collect();
    assert_eq!(order, vec!["a.txt", "b.txt", "c.txt", "d.txt"]);
    assert!(results[1].result.is_err());
    for idx in [0, 2, 3] {
        let info = results[idx].result.as_ref().unwrap();
        assert_eq!(info.name(), format!("/{}", results[idx].pub_path));
    }
}

#[tokio::test]
async fn list_stream_hands_out_decoded_entries() {
    let server = MockServer::start(|_| {
        MockResponse::multistatus(&multistatus(&[
            folder_entry("/remote.php/webdav/"),
            file_entry("/remote.php/webdav/one", 1, "1"),
            r#"<d:response><d:href>/remote.php/webdav/hidden</d:href><d:propstat><d:prop/><d:status>HTTP/1.1 404 Not Found</d:status></d:propstat></d:response>"#.to_string(),
            file_entry("/remote.php/webdav/two", 2, "2"),
        ]))
    })
    .await;
    let client = WebDavClient::new(server.session()).unwrap();

    let mut names = Vec::new();
    client
        .list_stream("/", Depth::One, &[], |info| {
            names.push(info.name().to_string());
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(names, vec!["/", "/one", "/two"]);
}

#[tokio::test]
async fn list_stream_surfaces_http_errors() {
    let server =
        MockServer::start(|_| MockResponse::new(401, sabre_error("NotAuthenticated", "No auth")))
            .await;
    let client = WebDavClient::new(server.session()).unwrap();

    let err = client
        .list_stream("/", Depth::One, &[], |_| Ok(()))
        .await
        .unwrap_err();
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::UnexpectedStatus { status, message }) => {
            assert_eq!(*status, StatusCode::UNAUTHORIZED);
            assert_eq!(message.as_deref(), Some("No auth"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn gzip_encoded_listings_are_decoded() {
    let body = gzip(
        multistatus(&[
            folder_entry("/remote.php/webdav/big/"),
            file_entry("/remote.php/webdav/big/x.bin", 9000, "77"),
        ])
        .as_bytes(),
    )
    .await;
    let server = MockServer::start(move |_| {
        MockResponse::new(207, body.clone())
            .with_header("Content-Type", "application/xml")
            .with_header("Content-Encoding", "gzip")
    })
    .await;
    let client = WebDavClient::new(server.session()).unwrap();

    let files = client.list("/big", Depth::One, &[]).await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[1].size(), Some(9000));

    let mut streamed = Vec::new();
    client
        .list_stream("/big", Depth::One, &[], |info| {
            streamed.push(info);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(streamed, files);
}

#[tokio::test]
async fn upload_download_and_folder_operations() {
    let server = MockServer::start(|req| match req.method.as_str() {
        "PUT" => MockResponse::new(201, "").with_header("ETag", "\"v2\""),
        "GET" => MockResponse::new(200, "hello world"),
        "MKCOL" => MockResponse::new(
            405,
            sabre_error("MethodNotAllowed", "The resource you tried to create already exists"),
        ),
        "DELETE" => MockResponse::new(204, ""),
        _ => MockResponse::new(400, ""),
    })
    .await;
    let client = WebDavClient::new(server.session()).unwrap();

    let etag = client
        .put_file_contents("/up/a b.txt", Bytes::from_static(b"payload"))
        .await
        .unwrap();
    assert_eq!(etag.as_deref(), Some("\"v2\""));
    let put = server.last_request();
    assert_eq!(put.path(), "/remote.php/webdav/up/a%20b.txt");
    assert_eq!(put.body, "payload");
    assert_eq!(put.header("content-type"), Some("application/octet-stream"));

    let contents = client.get_file_contents("/up/a b.txt").await.unwrap();
    assert_eq!(contents, Bytes::from_static(b"hello world"));

    let err = client.create_folder("/up").await.unwrap_err();
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::UnexpectedStatus { status, message }) => {
            assert_eq!(*status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(
                message.as_deref(),
                Some("The resource you tried to create already exists")
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }

    client.delete("/up").await.unwrap();
    assert_eq!(server.last_request().method, "DELETE");
}

#[tokio::test]
async fn move_and_copy_send_absolute_destinations() {
    let server = MockServer::start(|req| match req.method.as_str() {
        "MOVE" => MockResponse::new(201, ""),
        "COPY" => MockResponse::new(204, ""),
        _ => MockResponse::new(400, ""),
    })
    .await;
    let client = WebDavClient::new(server.session()).unwrap();

    client.move_to("/a.txt", "/archive/b c.txt", false).await.unwrap();
    let mv = server.last_request();
    assert_eq!(mv.method, "MOVE");
    assert_eq!(mv.path(), "/remote.php/webdav/a.txt");
    assert_eq!(
        mv.header("destination"),
        Some(format!("{}remote.php/webdav/archive/b%20c.txt", server.base_url()).as_str())
    );
    assert_eq!(mv.header("overwrite"), Some("F"));

    client.copy_to("/a.txt", "/a-copy.txt", true).await.unwrap();
    let cp = server.last_request();
    assert_eq!(cp.method, "COPY");
    assert_eq!(cp.header("overwrite"), Some("T"));
}

#[tokio::test]
async fn proppatch_failures_name_the_rejected_properties() {
    let server = MockServer::start(|req| {
        let status = if req.body.contains("<oc:favorite>1</oc:favorite>") {
            "HTTP/1.1 200 OK"
        } else {
            "HTTP/1.1 403 Forbidden"
        };
        MockResponse::multistatus(&multistatus(&[format!(
            r#"<d:response><d:href>/remote.php/webdav/a.txt</d:href><d:propstat><d:prop><oc:favorite/></d:prop><d:status>{status}</d:status></d:propstat></d:response>"#
        )]))
    })
    .await;
    let client = WebDavClient::new(server.session()).unwrap();

    client.set_favorite("/a.txt", true).await.unwrap();
    let req = server.last_request();
    assert_eq!(req.method, "PROPPATCH");
    assert!(req.body.contains("<d:propertyupdate"));

    let err = client.set_favorite("/a.txt", false).await.unwrap_err();
    let text = err.to_string();
    assert!(text.contains("403 Forbidden"), "{text}");
    assert!(text.contains(props::FAVORITE), "{text}");
}

#[tokio::test]
async fn filter_files_reports_favorites() {
    let server = MockServer::start(|_| {
        MockResponse::multistatus(&multistatus(&[
            file_entry("/remote.php/dav/files/alice/fav.txt", 5, "11"),
            folder_entry("/remote.php/dav/files/alice/Starred/"),
        ]))
    })
    .await;
    let session = server.session().with_dav_variant(DavPathVariant::Dav);
    let client = WebDavClient::new(session).unwrap();

    let files = client
        .filter_files("/", &FilterRules::favorites(), &[])
        .await
        .unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["/fav.txt", "/Starred"]);

    let req = server.last_request();
    assert_eq!(req.method, "REPORT");
    assert!(req.body.contains("<oc:favorite>1</oc:favorite>"));

    assert!(
        client
            .filter_files("/", &FilterRules::default(), &[])
            .await
            .is_err()
    );
}

#[tokio::test]
async fn resolves_paths_from_file_ids() {
    let server = MockServer::start(|_| {
        MockResponse::multistatus(&multistatus(&[r#"<d:response><d:href>/remote.php/dav/meta/4711/</d:href><d:propstat><d:prop><oc:meta-path-for-user>/Documents/report.pdf</oc:meta-path-for-user></d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>"#.to_string()]))
    })
    .await;
    let client = WebDavClient::new(server.session()).unwrap();

    let path = client.path_for_file_id("4711").await.unwrap();
    assert_eq!(path, "/Documents/report.pdf");
    assert_eq!(server.last_request().path(), "/remote.php/dav/meta/4711");
}

#[tokio::test]
async fn requests_without_credentials_are_refused_locally() {
    let server = MockServer::start(|_| MockResponse::new(500, "")).await;
    let session = Session::new(server.base_url()).unwrap();
    let client = WebDavClient::new(session).unwrap();

    let err = client.list("/", Depth::Zero, &[]).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::NotAuthenticated)
    ));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn dav_variant_without_user_is_an_error() {
    let server = MockServer::start(|_| MockResponse::new(500, "")).await;
    let session = Session::new(server.base_url())
        .unwrap()
        .with_bearer_token("token")
        .unwrap()
        .with_dav_variant(DavPathVariant::Dav);
    let client = WebDavClient::new(session).unwrap();

    let err = client.list("/", Depth::Zero, &[]).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::MissingUser)
    ));
}
