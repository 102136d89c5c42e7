pub mod telemetry {
    //! Messages streamed by `telemetry.Telemetry/PollOnce`.

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TelemetryLabel {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub value: ::prost::alloc::string::String,
    }

    /// Wire layout of `google.protobuf.Timestamp`.
    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct Timestamp {
        #[prost(int64, tag = "1")]
        pub seconds: i64,
        #[prost(int32, tag = "2")]
        pub nanos: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TelemetryDatum {
        #[prost(string, tag = "1")]
        pub metric: ::prost::alloc::string::String,
        #[prost(double, tag = "2")]
        pub value: f64,
        #[prost(message, repeated, tag = "3")]
        pub labels: ::prost::alloc::vec::Vec<TelemetryLabel>,
        #[prost(message, optional, tag = "4")]
        pub timestamp: ::core::option::Option<Timestamp>,
    }
}
