//! Aggregation pipelines and update documents
//!
//! One function per operation. Every read pipeline starts by unwinding the
//! embedded array it works on, so a parent document contributes one stream
//! element per array entry.

use mongodb::bson::{doc, Document};

pub const MEMBER_ARRAY: &str = "member";

/// Field name of the `$avg` accumulator in [`average_age`].
pub const AVERAGE_FIELD: &str = "average";

/// Identifier bound to the matching array element in [`set_purchase_time_update`].
const ELEMENT: &str = "m";

pub fn average_age() -> Vec<Document> {
    vec![
        doc! { "$unwind": "$member" },
        doc! { "$group": { "_id": null, (AVERAGE_FIELD): { "$avg": "$member.Age" } } },
    ]
}

pub fn members_by_level_and_age(min_level: i32, older_than: i32) -> Vec<Document> {
    vec![
        doc! { "$unwind": "$member" },
        doc! {
            "$match": {
                "member.Level_of_membership": { "$gte": min_level },
                "member.Age": { "$gt": older_than },
            }
        },
        doc! { "$replaceRoot": { "newRoot": "$member" } },
    ]
}

/// Cross product of both arrays within each parent document, kept where the
/// ids agree. The amount stays raw; coercion happens on the client.
pub fn spend_rows() -> Vec<Document> {
    vec![
        doc! { "$unwind": "$happy_hour_member" },
        doc! { "$unwind": "$member" },
        doc! {
            "$match": {
                "$expr": { "$eq": ["$happy_hour_member.Member_ID", "$member.Member_ID"] }
            }
        },
        doc! {
            "$project": {
                "_id": 0,
                "Member_ID": "$happy_hour_member.Member_ID",
                "Name": "$member.Name",
                "Total_amount": "$happy_hour_member.Total_amount",
            }
        },
    ]
}

pub fn happy_hour_amounts() -> Vec<Document> {
    vec![
        doc! { "$unwind": "$happy_hour_member" },
        doc! {
            "$project": {
                "_id": 0,
                "Member_ID": "$happy_hour_member.Member_ID",
                "Total_amount": "$happy_hour_member.Total_amount",
            }
        },
    ]
}

pub fn long_purchases(minutes: i32) -> Vec<Document> {
    vec![
        doc! { "$unwind": "$member" },
        doc! { "$match": { "member.Time_of_purchase": { "$gt": minutes } } },
        doc! { "$sort": { "member.Name": 1 } },
        doc! { "$project": { "_id": 0, "Name": "$member.Name" } },
    ]
}

pub fn members_with_card(card: &str) -> Vec<Document> {
    vec![
        doc! { "$unwind": "$member" },
        doc! { "$match": { "member.Membership_card": card } },
        doc! { "$replaceRoot": { "newRoot": "$member" } },
    ]
}

/// Selects any parent document that carries a `member` array.
pub fn member_array_filter() -> Document {
    doc! { (MEMBER_ARRAY): { "$exists": true } }
}

pub fn push_member_update(member: Document) -> Document {
    doc! { "$push": { (MEMBER_ARRAY): member } }
}

pub fn name_filter(name: &str) -> Document {
    doc! { "member.Name": name }
}

/// Positional update touching only the elements bound by
/// [`set_purchase_time_array_filters`].
pub fn set_purchase_time_update(minutes: i32) -> Document {
    let field = format!("member.$[{}].Time_of_purchase", ELEMENT);
    doc! { "$set": { (field): minutes } }
}

pub fn set_purchase_time_array_filters(name: &str) -> Vec<Document> {
    let field = format!("{}.Name", ELEMENT);
    vec![doc! { (field): name }]
}

pub fn pull_by_purchase_time_update(minutes: i32) -> Document {
    doc! { "$pull": { (MEMBER_ARRAY): { "Time_of_purchase": minutes } } }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;

    fn stage_names(pipeline: &[Document]) -> Vec<String> {
        pipeline
            .iter()
            .map(|stage| stage.keys().next().cloned().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_average_age_groups_everything() {
        let pipeline = average_age();
        assert_eq!(stage_names(&pipeline), vec!["$unwind", "$group"]);
        let group = pipeline[1].get_document("$group").unwrap();
        assert_eq!(group.get("_id"), Some(&Bson::Null));
        assert!(group.get_document(AVERAGE_FIELD).is_ok());
    }

    #[test]
    fn test_level_and_age_bounds() {
        let pipeline = members_by_level_and_age(4, 35);
        assert_eq!(stage_names(&pipeline), vec!["$unwind", "$match", "$replaceRoot"]);
        let matcher = pipeline[1].get_document("$match").unwrap();
        assert_eq!(
            matcher.get_document("member.Level_of_membership").unwrap(),
            &doc! { "$gte": 4 }
        );
        assert_eq!(matcher.get_document("member.Age").unwrap(), &doc! { "$gt": 35 });
    }

    #[test]
    fn test_spend_rows_join_on_member_id() {
        let pipeline = spend_rows();
        assert_eq!(
            stage_names(&pipeline),
            vec!["$unwind", "$unwind", "$match", "$project"]
        );
        let expr = pipeline[2]
            .get_document("$match")
            .unwrap()
            .get_document("$expr")
            .unwrap();
        let operands = expr.get_array("$eq").unwrap();
        assert_eq!(operands[0], Bson::String("$happy_hour_member.Member_ID".into()));
        assert_eq!(operands[1], Bson::String("$member.Member_ID".into()));
    }

    #[test]
    fn test_long_purchases_sorts_ascending_by_name() {
        let pipeline = long_purchases(15);
        assert_eq!(
            stage_names(&pipeline),
            vec!["$unwind", "$match", "$sort", "$project"]
        );
        assert_eq!(
            pipeline[2].get_document("$sort").unwrap(),
            &doc! { "member.Name": 1 }
        );
    }

    #[test]
    fn test_card_match_is_exact() {
        let pipeline = members_with_card("Black");
        let matcher = pipeline[1].get_document("$match").unwrap();
        assert_eq!(matcher.get_str("member.Membership_card").unwrap(), "Black");
    }

    #[test]
    fn test_purchase_time_update_is_array_scoped() {
        let update = set_purchase_time_update(99);
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_i32("member.$[m].Time_of_purchase").unwrap(), 99);

        let filters = set_purchase_time_array_filters("Marín, Alberto");
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].get_str("m.Name").unwrap(), "Marín, Alberto");
    }

    #[test]
    fn test_pull_matches_purchase_time() {
        let update = pull_by_purchase_time_update(99);
        assert_eq!(update, doc! { "$pull": { "member": { "Time_of_purchase": 99 } } });
    }
}
