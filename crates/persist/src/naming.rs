//! Conversion between snake-case storage names and camel-case property names.

/// Converts a storage name to a property name.
///
/// Each `_`-separated segment is lowercased and its first character uppercased,
/// then the segments are joined and the result's first character lowercased:
/// `user_name` becomes `userName`. A name without `_` is lowercased whole.
#[must_use]
pub fn to_property_name(storage_name: &str) -> String {
    let mut name = String::with_capacity(storage_name.len());
    if storage_name.contains('_') {
        for segment in storage_name.split('_').filter(|s| !s.is_empty()) {
            name.push_str(&capitalize(&segment.to_lowercase()));
        }
    } else {
        name.push_str(&capitalize(&storage_name.to_lowercase()));
    }
    uncapitalize(&name)
}

/// Converts a property (or type) name to a storage name.
///
/// Every upper-case letter after the first character starts a new word and is
/// preceded by `_`. Digits never start a word.
///
/// `capitalize` selects the output casing:
///
/// * `<= 0` all lower case (`userName` becomes `user_name`)
/// * `1` upper-case word starts (`userName` becomes `User_Name`)
/// * `> 1` all upper case (`userName` becomes `USER_NAME`)
#[must_use]
pub fn to_storage_name(property_name: &str, capitalize: i32) -> String {
    let mut name = String::with_capacity(property_name.len() + 4);
    let mut chars = property_name.chars();

    if let Some(first) = chars.next() {
        if capitalize <= 0 {
            name.extend(first.to_lowercase());
        } else {
            name.extend(first.to_uppercase());
        }
    }

    for ch in chars {
        if ch.is_uppercase() {
            name.push('_');
            if capitalize > 0 {
                name.extend(ch.to_uppercase());
            } else {
                name.extend(ch.to_lowercase());
            }
        } else if capitalize > 1 {
            name.extend(ch.to_uppercase());
        } else {
            name.extend(ch.to_lowercase());
        }
    }

    name
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| first.to_uppercase().chain(chars).collect())
}

fn uncapitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| first.to_lowercase().chain(chars).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_to_property() {
        assert_eq!(to_property_name("user_name"), "userName");
        assert_eq!(to_property_name("ORDER_ID"), "orderId");
        assert_eq!(to_property_name("total_amount"), "totalAmount");
        assert_eq!(to_property_name("Status"), "status");
        assert_eq!(to_property_name("_leading__double_"), "leadingDouble");
        assert_eq!(to_property_name(""), "");
    }

    #[test]
    fn property_to_storage() {
        assert_eq!(to_storage_name("userName", 0), "user_name");
        assert_eq!(to_storage_name("OrderItem", 0), "order_item");
        assert_eq!(to_storage_name("userName", 1), "User_Name");
        assert_eq!(to_storage_name("userName", 2), "USER_NAME");
        assert_eq!(to_storage_name("address2Line", 0), "address2_line");
        assert_eq!(to_storage_name("", 0), "");
    }

    #[test]
    fn first_character_ignores_mode_one_distinction() {
        // interior characters honour `1` vs `> 1`; the first character does not
        assert_eq!(to_storage_name("userName", 1), "User_Name");
        assert_eq!(to_storage_name("username", 1), "Username");
        assert_eq!(to_storage_name("username", 2), "USERNAME");
    }

    #[test]
    fn round_trip_for_camel_runs() {
        for property in ["userName", "orderId", "createTime", "a", "lastLoginTimeUtc"] {
            let storage = to_storage_name(property, 0);
            assert_eq!(to_property_name(&storage), property, "via {storage}");
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let names = ["user_name", "USER_NAME", "order", "a_b_c", "x1_y2", "Mixed_Case_Name", "__"];
        for storage in names {
            let once = to_property_name(storage);
            let twice = to_property_name(&to_storage_name(&once, 0));
            assert_eq!(twice, once, "for {storage}");
        }
    }
}
