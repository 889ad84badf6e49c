//! The remote API's endpoints, one constant per endpoint.
//!
//! Every route here is validated at compile time by [`Route::new`].

use crate::route::{
    AuthMode::{ApiKey, Bearer},
    Method::{Delete, Get, Post, Put},
    Route,
};

/// Account endpoints.
pub mod account {
    use super::*;

    // Profiles
    pub const GET_USER_PROFILE: Route = Route::new(Get, Bearer, "3/account/{username}");
    pub const GET_USER_GALLERY_PROFILE: Route =
        Route::new(Get, Bearer, "3/account/{username}/gallery_profile");

    // Blocks
    pub const GET_SELF_BLOCK_STATUS: Route = Route::new(Get, Bearer, "account/v1/{username}/block");
    pub const GET_SELF_BLOCKS: Route = Route::new(Get, Bearer, "3/account/me/block");
    pub const POST_SELF_BLOCK_CREATE: Route = Route::new(Post, Bearer, "account/v1/{username}/block");
    pub const DELETE_SELF_BLOCK_CREATE: Route =
        Route::new(Delete, Bearer, "account/v1/{username}/block");

    // Resources
    pub const GET_USER_GALLERY_FAVORITES: Route = Route::new(
        Get,
        Bearer,
        "3/account/{username}/gallery_favorites/(page)/(favorites_sort)",
    );
    pub const GET_USER_FAVORITES: Route = Route::new(
        Get,
        Bearer,
        "3/account/{username}/favorites/(page)/(favorites_sort)",
    );
    pub const GET_USER_SUBMISSIONS: Route =
        Route::new(Get, Bearer, "3/account/{username}/submissions/(page)");

    // Avatars
    pub const GET_USER_AVAILABLE_AVATARS: Route =
        Route::new(Get, Bearer, "3/account/{username}/available_avatars");
    pub const GET_USER_AVATAR: Route = Route::new(Get, Bearer, "3/account/{username}/avatar");

    // Settings
    pub const GET_SELF_SETTINGS: Route = Route::new(Get, Bearer, "3/account/me/settings");
    pub const POST_SELF_SETTINGS: Route = Route::new(Post, Bearer, "3/account/me/settings");

    // Albums
    pub const GET_USER_ALBUMS: Route = Route::new(Get, Bearer, "3/account/{username}/albums/(page)");
    pub const GET_USER_ALBUM: Route =
        Route::new(Get, Bearer, "3/account/{username}/album/{album_hash}");
    pub const GET_USER_ALBUM_IDS: Route =
        Route::new(Get, Bearer, "3/account/{username}/albums/ids/(page)");
    pub const GET_USER_ALBUM_COUNT: Route =
        Route::new(Get, Bearer, "3/account/{username}/albums/count");
    pub const DELETE_USER_ALBUM: Route =
        Route::new(Delete, Bearer, "3/account/{username}/album/{delete_hash}");

    // Comments
    pub const GET_USER_COMMENTS: Route = Route::new(
        Get,
        Bearer,
        "3/account/{username}/comments/(comment_sort)/(page)",
    );
    pub const GET_USER_COMMENT: Route =
        Route::new(Get, Bearer, "3/account/{username}/comment/{comment_id}");
    pub const GET_USER_COMMENT_IDS: Route = Route::new(
        Get,
        Bearer,
        "3/account/{username}/comments/ids/(comment_sort)/(page)",
    );
    pub const GET_USER_COMMENT_COUNT: Route =
        Route::new(Get, Bearer, "3/account/{username}/comments/count");
    pub const DELETE_SELF_COMMENT: Route =
        Route::new(Delete, Bearer, "3/account/{username}/comment/{comment_id}");

    // Images
    pub const GET_SELF_IMAGES: Route = Route::new(Get, Bearer, "3/account/{username}/images/(page)");
    pub const GET_USER_IMAGE: Route =
        Route::new(Get, Bearer, "3/account/{username}/image/{image_hash}");
    pub const GET_USER_IMAGE_IDS: Route =
        Route::new(Get, Bearer, "3/account/{username}/images/ids/(page)");
    pub const GET_USER_IMAGE_COUNT: Route =
        Route::new(Get, Bearer, "3/account/{username}/images/count");
    pub const DELETE_USER_IMAGE: Route =
        Route::new(Delete, Bearer, "3/account/{username}/image/{delete_hash}");
}

/// Album endpoints.
pub mod album {
    use super::*;

    pub const GET_ALBUM: Route = Route::new(Get, ApiKey, "3/album/{album_hash}");
    pub const GET_ALBUM_IMAGES: Route = Route::new(Get, ApiKey, "3/album/{album_hash}/images");
    pub const GET_ALBUM_IMAGE: Route =
        Route::new(Get, ApiKey, "3/album/{album_hash}/image/{image_hash}");
    pub const POST_ALBUM_CREATE: Route = Route::new(Post, Bearer, "3/album");
    pub const PUT_ALBUM_UPDATE: Route = Route::new(Put, Bearer, "3/album/{album_hash}");
    pub const DELETE_ALBUM: Route = Route::new(Delete, Bearer, "3/album/{album_hash}");
    pub const POST_ALBUM_FAVORITE: Route = Route::new(Post, Bearer, "3/album/{album_hash}/favorite");
    pub const POST_ALBUM_IMAGES_SET: Route = Route::new(Post, Bearer, "3/album/{album_hash}");
    pub const PUT_ALBUM_IMAGES_ADD: Route = Route::new(Put, Bearer, "3/album/{album_hash}/add");
    pub const DELETE_ALBUM_IMAGES_REMOVE: Route =
        Route::new(Delete, Bearer, "3/album/{album_hash}/remove_images");
}

/// Comment endpoints.
pub mod comment {
    use super::*;

    pub const GET_COMMENT: Route = Route::new(Get, ApiKey, "3/comment/{comment_id}");
    pub const GET_COMMENT_REPLIES: Route = Route::new(Get, ApiKey, "3/comment/{comment_id}/replies");
    pub const POST_COMMENT_CREATE: Route = Route::new(Post, Bearer, "3/comment");
    pub const POST_COMMENT_REPLY: Route = Route::new(Post, Bearer, "3/comment/{comment_id}");
    pub const DELETE_COMMENT: Route = Route::new(Delete, Bearer, "3/comment/{comment_id}");
    pub const POST_COMMENT_VOTE: Route = Route::new(Post, Bearer, "3/comment/{comment_id}/vote/{vote}");
    pub const POST_COMMENT_REPORT: Route = Route::new(Post, Bearer, "3/comment/{comment_id}/report");
}

/// Gallery endpoints.
pub mod gallery {
    use super::*;

    pub const GET_GALLERY: Route = Route::new(Get, ApiKey, "3/gallery/(section)/(sort)/(page)");
    pub const GET_GALLERY_SEARCH: Route = Route::new(Get, ApiKey, "3/gallery/search/(sort)/(page)");
    pub const GET_GALLERY_TAG: Route = Route::new(Get, ApiKey, "3/gallery/t/{tag}/(sort)/(page)");
    pub const GET_GALLERY_ALBUM: Route = Route::new(Get, ApiKey, "3/gallery/album/{gallery_hash}");
    pub const GET_GALLERY_IMAGE: Route = Route::new(Get, ApiKey, "3/gallery/image/{gallery_hash}");
    pub const POST_GALLERY_SHARE: Route = Route::new(Post, Bearer, "3/gallery/{gallery_hash}");
    pub const DELETE_GALLERY_ELEMENT: Route = Route::new(Delete, Bearer, "3/gallery/{gallery_hash}");
    pub const GET_GALLERY_COMMENTS: Route =
        Route::new(Get, ApiKey, "3/gallery/{gallery_hash}/comments/(comment_sort)");
    pub const GET_GALLERY_VOTES: Route = Route::new(Get, ApiKey, "3/gallery/{gallery_hash}/votes");
    pub const POST_GALLERY_VOTE: Route = Route::new(Post, Bearer, "3/gallery/{gallery_hash}/vote/{vote}");
}

/// Image endpoints.
pub mod image {
    use super::*;

    pub const GET_IMAGE: Route = Route::new(Get, ApiKey, "3/image/{image_hash}");
    pub const POST_IMAGE_UPLOAD: Route = Route::new(Post, Bearer, "3/image");
    pub const POST_IMAGE_UPDATE: Route = Route::new(Post, Bearer, "3/image/{image_hash}");
    pub const DELETE_IMAGE: Route = Route::new(Delete, Bearer, "3/image/{image_hash}");
    pub const POST_IMAGE_FAVORITE: Route = Route::new(Post, Bearer, "3/image/{image_hash}/favorite");
}
