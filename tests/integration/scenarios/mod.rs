mod binary_tests;
