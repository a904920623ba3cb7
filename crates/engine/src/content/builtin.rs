// Normalized relative path paired with the raw XML, in compile order.
pub(crate) const BUILTIN_SOURCES: &[(&str, &str)] = &[
    ("items.xml", include_str!("../../../../assets/base/items.xml")),
    (
        "locations.xml",
        include_str!("../../../../assets/base/locations.xml"),
    ),
    (
        "messages.xml",
        include_str!("../../../../assets/base/messages.xml"),
    ),
    ("quests.xml", include_str!("../../../../assets/base/quests.xml")),
    (
        "signals.xml",
        include_str!("../../../../assets/base/signals.xml"),
    ),
];
