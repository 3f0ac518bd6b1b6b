pub mod invoice;
pub mod mock_rest_client;
