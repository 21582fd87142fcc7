use super::{Pipeline, RecordSource};
use crate::processor::extract::JsonPath;
use crate::processor::flatten::{ExtractionPlan, Param, Scope, TableMapping};
use crate::processor::normalize::Normalizer::{Identity, JsonEmbed, TextClean, TimestampParse};
use crate::schema::{DataType, FieldSpec, TableSpec};
use common::Result;

impl Pipeline {
    /// Normalized tweet tables: one `Tweet` row per tweet plus user, place,
    /// hashtag, mention and url rows keyed by `tweetId`.
    ///
    /// Input files are named by user id, and a file is considered loaded once
    /// that id shows up in `TweetUser.userId`.
    pub fn tweets(prefix: &str) -> Result<Self> {
        let tweet = TableSpec::with_prefix(
            "Tweet",
            vec![
                FieldSpec::new("tweetId", DataType::BigInt).primary_key(),
                FieldSpec::new("text", DataType::Text),
                FieldSpec::new("truncated", DataType::Boolean),
                FieldSpec::new("isQuoteStatus", DataType::Boolean),
                FieldSpec::new("inReplyToStatusId", DataType::BigInt),
                FieldSpec::new("favoriteCount", DataType::BigInt),
                FieldSpec::new("source", DataType::Text),
                FieldSpec::new("coordinates_x", DataType::Numeric(16, 8)),
                FieldSpec::new("coordinates_y", DataType::Numeric(16, 8)),
                FieldSpec::new("inReplyToScreenName", DataType::Varchar(45)),
                FieldSpec::new("retweetCount", DataType::BigInt),
                FieldSpec::new("inReplyToUserId", DataType::BigInt),
                FieldSpec::new("lang", DataType::Varchar(10)),
                FieldSpec::new("createdAt", DataType::Timestamp),
                FieldSpec::new("collectedAt", DataType::Timestamp),
            ],
            prefix,
        )?;
        let tweet_id = tweet.reference("tweetId")?;

        let tweet_plan = ExtractionPlan::new()
            .path("tweetId", "id_str", Identity)
            .path("text", "text", TextClean)
            .path("truncated", "truncated", Identity)
            .path("isQuoteStatus", "is_quote_status", Identity)
            .path("inReplyToStatusId", "in_reply_to_status_id", Identity)
            .path("favoriteCount", "favorite_count", Identity)
            .path("source", "source", Identity)
            .path("coordinates_x", "coordinates.coordinates.0", Identity)
            .path("coordinates_y", "coordinates.coordinates.1", Identity)
            .path("inReplyToScreenName", "in_reply_to_screen_name", TextClean)
            .path("retweetCount", "retweet_count", Identity)
            .path("inReplyToUserId", "in_reply_to_user_id", Identity)
            .path("lang", "lang", Identity)
            .path("createdAt", "created_at", TimestampParse)
            .param("collectedAt", Param::CollectedTs);

        let user = TableSpec::with_prefix(
            "TweetUser",
            vec![
                FieldSpec::new("tweetId", DataType::BigInt)
                    .primary_key()
                    .references(tweet_id.clone()),
                FieldSpec::new("userId", DataType::BigInt),
                FieldSpec::new("timeZone", DataType::Varchar(45)),
                FieldSpec::new("verified", DataType::Boolean),
                FieldSpec::new("geoEnabled", DataType::Boolean),
                FieldSpec::new("followersCount", DataType::BigInt),
                FieldSpec::new("protected", DataType::Boolean),
                FieldSpec::new("lang", DataType::Varchar(10)),
                FieldSpec::new("utcOffset", DataType::BigInt),
                FieldSpec::new("statusesCount", DataType::BigInt),
                FieldSpec::new("description", DataType::Text),
                FieldSpec::new("friendsCount", DataType::BigInt),
                FieldSpec::new("name", DataType::Varchar(128)),
                FieldSpec::new("favoritesCount", DataType::BigInt),
                FieldSpec::new("screenName", DataType::Varchar(45)),
                FieldSpec::new("url", DataType::Text),
                FieldSpec::new("createdAt", DataType::Timestamp),
                FieldSpec::new("location", DataType::Varchar(256)),
                FieldSpec::new("collectedAt", DataType::Timestamp),
            ],
            prefix,
        )?;

        let user_plan = ExtractionPlan::new()
            .path("tweetId", "id_str", Identity)
            .path("userId", "user.id_str", Identity)
            .path("timeZone", "user.time_zone", Identity)
            .path("verified", "user.verified", Identity)
            .path("geoEnabled", "user.geo_enabled", Identity)
            .path("followersCount", "user.followers_count", Identity)
            .path("protected", "user.protected", Identity)
            .path("lang", "user.lang", Identity)
            .path("utcOffset", "user.utc_offset", Identity)
            .path("statusesCount", "user.statuses_count", Identity)
            .path("description", "user.description", TextClean)
            .path("friendsCount", "user.friends_count", Identity)
            .path("name", "user.name", TextClean)
            .path("favoritesCount", "user.favourites_count", Identity)
            .path("screenName", "user.screen_name", TextClean)
            .path("url", "user.url", Identity)
            .path("createdAt", "user.created_at", TimestampParse)
            .path("location", "user.location", TextClean)
            .param("collectedAt", Param::CollectedTs);

        let hashtag = TableSpec::with_prefix(
            "TweetHashtag",
            vec![
                FieldSpec::new("tweetId", DataType::BigInt).references(tweet_id.clone()),
                FieldSpec::new("hashtag", DataType::Text),
            ],
            prefix,
        )?;

        let hashtag_plan = ExtractionPlan::new()
            .parent("tweetId", "id_str", Identity)
            .path("hashtag", "text", TextClean);

        let mention = TableSpec::with_prefix(
            "TweetMention",
            vec![
                FieldSpec::new("tweetId", DataType::BigInt).references(tweet_id.clone()),
                FieldSpec::new("userId", DataType::BigInt),
                FieldSpec::new("mentionedId", DataType::BigInt),
                FieldSpec::new("mentionedScreenName", DataType::Varchar(45)),
                FieldSpec::new("mentionedName", DataType::Varchar(128)),
            ],
            prefix,
        )?;

        let mention_plan = ExtractionPlan::new()
            .parent("tweetId", "id_str", Identity)
            .parent("userId", "user.id_str", Identity)
            .path("mentionedId", "id_str", Identity)
            .path("mentionedScreenName", "screen_name", TextClean)
            .path("mentionedName", "name", TextClean);

        let url = TableSpec::with_prefix(
            "TweetUrl",
            vec![
                FieldSpec::new("tweetId", DataType::BigInt).references(tweet_id.clone()),
                FieldSpec::new("url", DataType::Text),
                FieldSpec::new("display_url", DataType::Text),
                FieldSpec::new("expanded_url", DataType::Text),
            ],
            prefix,
        )?;

        let url_plan = ExtractionPlan::new()
            .parent("tweetId", "id_str", Identity)
            .path("url", "url", Identity)
            .path("display_url", "display_url", Identity)
            .path("expanded_url", "expanded_url", Identity);

        // Place ids are hex strings, not integers.
        let place = TableSpec::with_prefix(
            "TweetPlace",
            vec![
                FieldSpec::new("tweetId", DataType::BigInt).references(tweet_id),
                FieldSpec::new("boundingBoxJson", DataType::Text),
                FieldSpec::new("country", DataType::Varchar(128)),
                FieldSpec::new("countryCode", DataType::Varchar(10)),
                FieldSpec::new("fullName", DataType::Text),
                FieldSpec::new("placeId", DataType::Varchar(64)),
                FieldSpec::new("placeName", DataType::Varchar(128)),
                FieldSpec::new("placeUrl", DataType::Text),
            ],
            prefix,
        )?;

        let place_plan = ExtractionPlan::new()
            .parent("tweetId", "id_str", Identity)
            .path("boundingBoxJson", "bounding_box", JsonEmbed)
            .path("country", "country", Identity)
            .path("countryCode", "country_code", Identity)
            .path("fullName", "full_name", Identity)
            .path("placeId", "id", Identity)
            .path("placeName", "name", Identity)
            .path("placeUrl", "url", Identity);

        let user_table = user.name().to_string();
        let mappings = vec![
            TableMapping::new(tweet, Scope::Record, tweet_plan)?,
            TableMapping::new(user, Scope::Record, user_plan)?,
            TableMapping::new(
                hashtag,
                Scope::Each(JsonPath::parse("entities.hashtags")),
                hashtag_plan,
            )?,
            TableMapping::new(
                mention,
                Scope::Each(JsonPath::parse("entities.user_mentions")),
                mention_plan,
            )?,
            TableMapping::new(url, Scope::Each(JsonPath::parse("entities.urls")), url_plan)?,
            TableMapping::new(place, Scope::Optional(JsonPath::parse("place")), place_plan)?,
        ];

        Pipeline::new(
            "tweets",
            RecordSource::Each(JsonPath::parse("historic_tweets")),
            mappings,
        )
        .with_dedup("id_str")
        .with_processed_marker(&user_table, "userId")
    }
}
