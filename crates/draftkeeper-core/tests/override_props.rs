use draftkeeper_core::payload::{build_body, normalize_date};
use draftkeeper_core::{FieldOverrides, PostFields, PostStatus};
use proptest::prelude::*;

fn status() -> impl Strategy<Value = PostStatus> {
    prop_oneof![
        Just(PostStatus::Draft),
        Just(PostStatus::Pending),
        Just(PostStatus::Private),
        Just(PostStatus::Published),
        Just(PostStatus::Future),
    ]
}

fn overrides() -> impl Strategy<Value = FieldOverrides> {
    (
        proptest::option::of("[a-z ]{0,12}"),
        proptest::option::of(status()),
        proptest::option::of(proptest::collection::vec(0..50u64, 0..4)),
        proptest::option::of(proptest::collection::vec(0..50u64, 0..4)),
        proptest::option::of(0..1000u64),
    )
        .prop_map(|(title, status, categories, tags, featured_media)| FieldOverrides {
            title,
            status,
            categories,
            tags,
            featured_media,
            ..FieldOverrides::default()
        })
}

proptest! {
    #[test]
    fn prop_merge_then_apply_matches_sequential_apply(a in overrides(), b in overrides()) {
        let base = PostFields::default();

        let mut merged = a.clone();
        merged.merge(b.clone());
        let mut via_merge = base.clone();
        merged.apply_to(&mut via_merge);

        let mut sequential = base;
        a.apply_to(&mut sequential);
        b.apply_to(&mut sequential);

        prop_assert_eq!(via_merge, sequential);
    }

    #[test]
    fn prop_empty_merge_is_identity(a in overrides()) {
        let mut left = FieldOverrides::new();
        left.merge(a.clone());
        prop_assert_eq!(&left, &a);

        let mut right = a.clone();
        right.merge(FieldOverrides::new());
        prop_assert_eq!(right, a);
    }

    #[test]
    fn prop_merge_is_associative(a in overrides(), b in overrides(), c in overrides()) {
        let mut ab_c = a.clone();
        ab_c.merge(b.clone());
        ab_c.merge(c.clone());

        let mut bc = b;
        bc.merge(c);
        let mut a_bc = a;
        a_bc.merge(bc);

        prop_assert_eq!(ab_c, a_bc);
    }

    #[test]
    fn prop_normalized_minutes_gain_seconds(
        y in 2000..2100u32, mo in 1..=12u32, d in 1..=28u32, h in 0..24u32, mi in 0..60u32
    ) {
        let short = format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}");
        prop_assert_eq!(normalize_date(&short), format!("{short}:00"));
        prop_assert_eq!(normalize_date(&format!("{short}:00")), format!("{short}:00"));
    }

    #[test]
    fn prop_date_sent_only_when_changed(h in 0..24u32) {
        let date = format!("2024-03-01T{h:02}:15:00");
        let fields = PostFields { date: Some(date.clone()), ..PostFields::default() };

        prop_assert_eq!(build_body(&fields, Some(&date)).date, None);
        prop_assert_eq!(build_body(&fields, Some("1999-01-01T00:00:00")).date, Some(date));
    }
}
