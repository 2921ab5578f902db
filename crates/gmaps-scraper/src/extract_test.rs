use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};

use super::*;
use crate::envelope::FRAMING_MARKER;
use crate::reviews::fixtures::raw_review;

/// Writes `value` at `path` inside `root`, padding lists with nulls.
fn put(root: &mut Value, path: &[usize], value: Value) {
    let Some((&last, parents)) = path.split_last() else {
        *root = value;
        return;
    };
    let mut node = root;
    for &index in parents {
        node = slot_mut(node, index);
    }
    *slot_mut(node, last) = value;
}

fn slot_mut(node: &mut Value, index: usize) -> &mut Value {
    if !node.is_array() {
        *node = Value::Array(Vec::new());
    }
    let items = node.as_array_mut().unwrap();
    if items.len() <= index {
        items.resize(index + 1, Value::Null);
    }
    &mut items[index]
}

/// Builds a sparse place blob one positional field at a time.
#[derive(Default)]
struct BlobBuilder(Vec<(Vec<usize>, Value)>);

impl BlobBuilder {
    fn with(mut self, path: &[usize], value: Value) -> Self {
        self.0.push((path.to_vec(), value));
        self
    }

    fn build(self) -> TreeValue {
        let mut root = Value::Array(Vec::new());
        for (path, value) in self.0 {
            put(&mut root, &path, value);
        }
        TreeValue::from(root)
    }
}

fn sparse_blob() -> BlobBuilder {
    BlobBuilder::default()
}

fn place_page(blob: &TreeValue) -> String {
    let blob_json = tree_to_json(blob);
    let mut inner = vec![Value::Null; 6];
    inner.push(blob_json);
    let framed = format!("{FRAMING_MARKER}\n{}", Value::Array(inner));
    let state = json!([null, null, null, { "Qf": [null, null, null, null, null, null, framed] }]);
    format!("<script>;window.APP_INITIALIZATION_STATE={state};window.APP_FLAGS=[]</script>")
}

fn tree_to_json(tree: &TreeValue) -> Value {
    use crate::tree::Scalar;
    match tree {
        TreeValue::List(items) => Value::Array(items.iter().map(tree_to_json).collect()),
        TreeValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), tree_to_json(v)))
                .collect(),
        ),
        TreeValue::Scalar(Scalar::Text(s)) => Value::String(s.clone()),
        TreeValue::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
        TreeValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
        TreeValue::Scalar(Scalar::Null) => Value::Null,
    }
}

#[test]
fn extracts_fixed_path_fields() {
    let blob = sparse_blob()
        .with(&[11], json!("Blue Door Cafe"))
        .with(&[10], json!("ChIJ123"))
        .with(&[9, 2], json!(38.7223))
        .with(&[9, 3], json!(-9.1393))
        .with(&[4, 7], json!(4.6))
        .with(&[4, 8], json!(1234))
        .with(&[4, 2], json!("€€"))
        .with(&[7, 0], json!("https://bluedoor.example"))
        .with(&[13], json!(["Cafe", "Bakery"]))
        .with(&[72, 0, 1, 6, 0], json!("https://lh5.example/thumb.jpg"))
        .with(&[32, 1, 1], json!("Cozy corner cafe"))
        .build();
    let record = extract_place_fields(&blob);

    assert_eq!(record.name.as_deref(), Some("Blue Door Cafe"));
    assert_eq!(record.place_id.as_deref(), Some("ChIJ123"));
    assert_eq!(
        record.coordinates,
        Some(Coordinates {
            latitude: 38.7223,
            longitude: -9.1393
        })
    );
    assert_eq!(record.rating, Some(4.6));
    assert_eq!(record.reviews_count, Some(1234));
    assert_eq!(record.price_range.as_deref(), Some("€€"));
    assert_eq!(record.website.as_deref(), Some("https://bluedoor.example"));
    assert_eq!(
        record.categories,
        Some(vec!["Cafe".to_string(), "Bakery".to_string()])
    );
    assert_eq!(
        record.thumbnail.as_deref(),
        Some("https://lh5.example/thumb.jpg")
    );
    assert_eq!(record.about.as_deref(), Some("Cozy corner cafe"));
    assert_eq!(record.status, PlaceStatus::Open);
    assert!(record.user_reviews.is_empty());
}

#[test]
fn address_skips_empty_parts() {
    let blob = sparse_blob().with(&[2], json!(["123 Main St", "", "Springfield"])).build();
    assert_eq!(
        extract_place_fields(&blob).address.as_deref(),
        Some("123 Main St, Springfield")
    );

    let blank = sparse_blob().with(&[2], json!(["", ""])).build();
    assert_eq!(extract_place_fields(&blank).address, None);
}

#[test]
fn coordinates_need_both_axes() {
    let blob = sparse_blob().with(&[9, 2], json!(38.7)).with(&[11], json!("x")).build();
    let record = extract_place_fields(&blob);
    assert_eq!(record.coordinates, None);

    let value = serde_json::to_value(&record).unwrap();
    assert!(value.get("coordinates").is_none());
}

#[test]
fn temporarily_closed_status_is_close() {
    let blob = sparse_blob().with(&[34, 4, 4], json!("Temporarily Closed")).build();
    let record = extract_place_fields(&blob);
    assert_eq!(record.status, PlaceStatus::Closed);
    assert_eq!(serde_json::to_value(&record).unwrap()["status"], "close");
}

#[test]
fn status_classification() {
    assert_eq!(classify_status(None), PlaceStatus::Open);
    assert_eq!(classify_status(Some("Open ⋅ Closes 6 PM")), PlaceStatus::Open);
    assert_eq!(classify_status(Some("PERMANENTLY CLOSED")), PlaceStatus::Closed);
    assert_eq!(classify_status(Some("Closed temporarily")), PlaceStatus::Closed);
    // "Closed" alone is the normal after-hours label, not a closure.
    assert_eq!(classify_status(Some("Closed ⋅ Opens 9 AM")), PlaceStatus::Open);
}

#[test]
fn phone_is_found_anywhere_and_normalized() {
    let tree = TreeValue::from(json!({"x": [["icon_call_googblue.png", "+1 (555) 123-4567"]]}));
    assert_eq!(find_phone(&tree).as_deref(), Some("15551234567"));
}

#[test]
fn phone_search_takes_first_depth_first_match() {
    let tree = TreeValue::from(json!([
        [null, [["call_googblue", "(22) 111"]]],
        ["call_googblue", "333"]
    ]));
    assert_eq!(find_phone(&tree).as_deref(), Some("22111"));
}

#[test]
fn phone_row_without_digits_keeps_searching() {
    let tree = TreeValue::from(json!([
        ["call_googblue", "n/a"],
        ["call_googblue", "+351 21 000 0000"]
    ]));
    assert_eq!(find_phone(&tree).as_deref(), Some("351210000000"));
}

#[test]
fn no_phone_row_is_absent() {
    let tree = TreeValue::from(json!([["other_icon", "555"], "call_googblue"]));
    assert_eq!(find_phone(&tree), None);
}

#[test]
fn open_hours_drop_malformed_rows() {
    let blob = sparse_blob()
        .with(
            &[34, 1],
            json!([
                ["Monday", ["9 AM–5 PM"]],
                ["", ["8 AM–1 PM"]],
                ["Tuesday", "Closed"],
                ["Wednesday", ["9 AM–12 PM", "1–5 PM"]]
            ]),
        )
        .build();
    let hours = extract_place_fields(&blob).open_hours.unwrap();
    assert_eq!(hours.days().collect::<Vec<_>>(), vec!["Monday", "Wednesday"]);
    assert_eq!(
        serde_json::to_value(&hours).unwrap()["Wednesday"],
        json!(["9 AM–12 PM", "1–5 PM"])
    );
}

#[test]
fn open_hours_absent_when_no_rows_survive() {
    let blob = sparse_blob().with(&[34, 1], json!([["", []]])).build();
    assert_eq!(extract_place_fields(&blob).open_hours, None);
}

#[test]
fn images_need_title_and_url() {
    let mut with_url = json!([null, null, "Front", []]);
    put(&mut with_url, &[3, 0, 6, 0], json!("https://lh5.example/front.jpg"));
    let mut missing_title = json!([null, null, null, []]);
    put(&mut missing_title, &[3, 0, 6, 0], json!("https://lh5.example/x.jpg"));
    let missing_url = json!([null, null, "Menu"]);

    let blob = sparse_blob().with(&[171, 0], json!([with_url, missing_title, missing_url])).build();
    let images = extract_place_fields(&blob).images.unwrap();
    assert_eq!(
        images,
        vec![PlaceImage {
            title: "Front".to_string(),
            url: "https://lh5.example/front.jpg".to_string()
        }]
    );
}

#[test]
fn attributes_parse_sections_and_flags() {
    let mut wheelchair = json!([null, "Wheelchair accessible entrance"]);
    put(&mut wheelchair, &[2, 1, 0, 0], json!(1.0));
    let mut parking = json!([null, "Wheelchair accessible parking"]);
    put(&mut parking, &[2, 1, 0, 0], json!(0.0));
    let unnamed = json!([null, ""]);

    let blob = sparse_blob()
        .with(
            &[100, 1],
            json!([
                ["accessibility", "Accessibility", [wheelchair, parking, unnamed]],
                ["payments", "Payments", [[null, ""]]],
                ["", "Nameless", [[null, "Cash"]]]
            ]),
        )
        .build();
    let sections = extract_place_fields(&blob).attributes.unwrap();

    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].id, "accessibility");
    assert_eq!(
        sections[0].options,
        vec![
            AttributeOption {
                name: "Wheelchair accessible entrance".to_string(),
                enabled: true
            },
            AttributeOption {
                name: "Wheelchair accessible parking".to_string(),
                enabled: false
            },
        ]
    );
}

#[test]
fn empty_blob_yields_only_defaults() {
    let record = extract_place_fields(&TreeValue::List(Vec::new()));
    assert_eq!(
        serde_json::to_value(&record).unwrap(),
        json!({"user_reviews": [], "status": "open"})
    );
}

#[test]
fn extract_place_data_decodes_page_and_attaches_reviews() {
    let blob = sparse_blob().with(&[11], json!("Blue Door Cafe")).build();
    let html = place_page(&blob);
    let reviews = vec![
        raw_review(Some("Ana"), None, Some("Lovely"), Some(json!([2024, 1, 5]))),
        raw_review(None, None, Some("dropped"), None),
    ];
    let mut rng = StdRng::seed_from_u64(3);

    let record = extract_place_data(&html, &reviews, &mut rng).unwrap();
    assert_eq!(record.name.as_deref(), Some("Blue Door Cafe"));
    assert_eq!(record.user_reviews.len(), 1);
    assert_eq!(record.user_reviews[0].when, "2024-01-05");
}

#[test]
fn extract_place_data_without_blob_is_none() {
    let mut rng = StdRng::seed_from_u64(3);
    assert!(extract_place_data("<html></html>", &[], &mut rng).is_none());
}
