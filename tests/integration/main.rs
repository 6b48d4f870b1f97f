//! Integration tests for stash

mod caching {
    use stash::fetch::{fingerprint, normalize, response};
    use stash::{
        CachingClient, CanonicalRequest, FetchInput, FetchResponse, FsStore, RequestInit,
        StashResult, Store, Transport,
    };
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Transport that serves a canned body and counts invocations
    struct CountingTransport {
        body: &'static [u8],
        calls: AtomicUsize,
    }

    impl CountingTransport {
        fn new(body: &'static [u8]) -> Self {
            Self {
                body,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for &CountingTransport {
        fn fetch(&self, request: &CanonicalRequest) -> StashResult<FetchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchResponse {
                status: 200,
                status_text: "OK".to_string(),
                redirected: false,
                url: request.url.to_string(),
                headers: vec![("x-served-by".to_string(), "stub".to_string())],
                body: self.body.to_vec(),
            })
        }
    }

    /// Store that fails the test the moment the orchestrator touches it
    struct PanicStore;

    impl Store for PanicStore {
        fn get(&self, key: &str) -> StashResult<Option<Vec<u8>>> {
            panic!("store.get must not be called (key: {key})");
        }

        fn set(&self, key: &str, _content: &[u8]) -> StashResult<()> {
            panic!("store.set must not be called (key: {key})");
        }
    }

    fn scratch_store() -> (TempDir, FsStore) {
        let root = TempDir::new().unwrap();
        let store = FsStore::new(root.path(), "responses");
        (root, store)
    }

    fn input(url: &str) -> FetchInput {
        FetchInput::try_from(url).unwrap()
    }

    #[test]
    fn second_identical_fetch_is_answered_from_cache() {
        let (_root, store) = scratch_store();
        let transport = CountingTransport::new(b"abc");
        let client = CachingClient::with_transport(store, &transport);

        let first = client
            .fetch(input("http://host/x"), RequestInit::default())
            .unwrap();
        assert_eq!(first.body, b"abc");
        assert_eq!(transport.calls(), 1);

        let second = client
            .fetch(input("http://host/x"), RequestInit::default())
            .unwrap();
        assert_eq!(second.body, b"abc");
        assert_eq!(transport.calls(), 1, "cache hit must not call the network");
    }

    #[test]
    fn hit_and_miss_paths_return_identical_shapes() {
        let (_root, store) = scratch_store();
        let transport = CountingTransport::new(b"This is the real deal here");
        let client = CachingClient::with_transport(store, &transport);

        let miss = client
            .fetch(input("http://host/deal"), RequestInit::default())
            .unwrap();
        let hit = client
            .fetch(input("http://host/deal"), RequestInit::default())
            .unwrap();

        assert_eq!(miss, hit);
        assert_eq!(hit.header("x-served-by"), Some("stub"));
    }

    #[test]
    fn different_requests_have_independent_entries() {
        let (_root, store) = scratch_store();
        let transport = CountingTransport::new(b"payload");
        let client = CachingClient::with_transport(store, &transport);

        client
            .fetch(input("http://host/one"), RequestInit::default())
            .unwrap();
        client
            .fetch(input("http://host/two"), RequestInit::default())
            .unwrap();

        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn local_scheme_never_touches_the_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"local bytes").unwrap();
        let url = url::Url::from_file_path(file.path()).unwrap();

        let transport = CountingTransport::new(b"ignored");
        let client = CachingClient::with_transport(PanicStore, &transport);

        let response = client
            .fetch(FetchInput::from(url), RequestInit::default())
            .unwrap();
        assert_eq!(response.body, b"ignored");
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn corrupt_entry_is_refetched_and_overwritten() {
        let (_root, store) = scratch_store();
        let transport = CountingTransport::new(b"fresh");

        let request =
            normalize(input("http://host/corrupt"), RequestInit::default()).unwrap();
        let key = fingerprint(&request);
        store.set(&key, b"definitely not cbor").unwrap();

        let client = CachingClient::with_transport(store.clone(), &transport);
        let response = client
            .fetch(input("http://host/corrupt"), RequestInit::default())
            .unwrap();

        assert_eq!(response.body, b"fresh");
        assert_eq!(transport.calls(), 1);

        // the overwritten entry now decodes
        let stored = store.get(&key).unwrap().unwrap();
        assert_eq!(response::decode(&stored).unwrap().body, b"fresh");
    }

    #[test]
    fn cache_entry_is_the_encoded_envelope() {
        let (_root, store) = scratch_store();
        let transport = CountingTransport::new(b"enveloped");
        let client = CachingClient::with_transport(store.clone(), &transport);

        let response = client
            .fetch(input("http://host/envelope"), RequestInit::default())
            .unwrap();

        let keys = store.list().unwrap();
        assert_eq!(keys.len(), 1);
        let stored = store.get(&keys[0]).unwrap().unwrap();
        assert_eq!(response::decode(&stored).unwrap(), response);
    }

    #[test]
    fn normalization_errors_fail_before_any_io() {
        let transport = CountingTransport::new(b"unused");
        let client = CachingClient::with_transport(PanicStore, &transport);

        let err = FetchInput::try_from("not a url").unwrap_err();
        assert_eq!(err.phase(), "normalize");
        assert_eq!(transport.calls(), 0);
        drop(client);
    }
}

mod merging {
    use stash::fetch::{fingerprint, normalize};
    use stash::{FetchInput, FetchRequest, RequestInit};
    use url::Url;

    #[test]
    fn headers_from_input_and_overlay_both_survive() {
        let mut request = FetchRequest::new(Url::parse("https://example.com").unwrap());
        request.headers = vec![("authentication".to_string(), "foo".to_string())];

        let canonical = normalize(
            FetchInput::from(request),
            RequestInit {
                headers: vec![("authorization".to_string(), "fritz".to_string())],
                ..Default::default()
            },
        )
        .unwrap();

        assert!(canonical
            .headers
            .contains(&("authentication".to_string(), "foo".to_string())));
        assert!(canonical
            .headers
            .contains(&("authorization".to_string(), "fritz".to_string())));
    }

    #[test]
    fn header_order_never_affects_the_fingerprint() {
        let build = |headers: Vec<(&str, &str)>| {
            let mut request = FetchRequest::new(Url::parse("https://example.com").unwrap());
            request.headers = headers
                .into_iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect();
            fingerprint(&normalize(FetchInput::from(request), RequestInit::default()).unwrap())
        };

        assert_eq!(
            build(vec![("a", "1"), ("b", "2")]),
            build(vec![("b", "2"), ("a", "1")])
        );
    }
}
